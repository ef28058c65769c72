//! Buyback Engine Pallet
//!
//! Order-accounting engine driving a permissionless, recurring "sell X,
//! accumulate Y" process on an external TWAMM venue. The pallet resolves
//! per-asset policy, validates order requests, keeps exactly one accumulation
//! position per sold asset, tracks the sequence of orders placed against it,
//! and claims proceeds of completed orders.

#![cfg_attr(not(feature = "std"), no_std)]

pub use pallet::*;

#[cfg(test)]
pub mod mock;

#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

pub mod weights;
pub use weights::WeightInfo;

use primitives::{AssetId, Balance, OrderKey, PositionId};

/// Adapter boundary to the external TWAMM execution venue.
///
/// Both operations are synchronous sub-calls inside the extrinsic's atomic
/// unit of work: an error aborts the whole call, including any balance
/// transfers already issued.
pub trait TwammVenue<AccountId> {
  /// Mint a new long-term sale position for `key`, or extend the existing
  /// one, committing `amount` of the sold asset held by `who`.
  /// Returns the venue position id and the selling rate it settled on.
  fn create_or_extend(
    who: &AccountId,
    key: OrderKey,
    amount: Balance,
  ) -> Result<(PositionId, Balance), frame::deps::sp_runtime::DispatchError>;

  /// Withdraw the proceeds of a completed order to `recipient`.
  fn withdraw(
    position_id: PositionId,
    key: OrderKey,
    recipient: &AccountId,
  ) -> Result<Balance, frame::deps::sp_runtime::DispatchError>;
}

/// Helper for benchmarking — creates and funds assets in benchmark context
#[cfg(feature = "runtime-benchmarks")]
pub trait BenchmarkHelper<AccountId> {
  fn create_asset(asset: AssetId) -> frame::deps::sp_runtime::DispatchResult;
  fn fund_account(
    who: &AccountId,
    asset: AssetId,
    amount: Balance,
  ) -> frame::deps::sp_runtime::DispatchResult;
}

#[cfg(feature = "runtime-benchmarks")]
impl<AccountId> BenchmarkHelper<AccountId> for () {
  fn create_asset(_asset: AssetId) -> frame::deps::sp_runtime::DispatchResult {
    Ok(())
  }
  fn fund_account(
    _who: &AccountId,
    _asset: AssetId,
    _amount: Balance,
  ) -> frame::deps::sp_runtime::DispatchResult {
    Ok(())
  }
}

#[frame::pallet]
pub mod pallet {
  use super::{TwammVenue, WeightInfo};
  use frame::deps::{
    frame_support::traits::{
      UnixTime,
      fungibles::{Inspect as FungiblesInspect, Mutate as FungiblesMutate},
      tokens::Preservation,
    },
    sp_runtime::traits::{AccountIdConversion, Zero},
  };
  use frame::prelude::*;
  use primitives::{AssetId, Balance, FeeTier, NO_ASSET, OrderIndex, OrderKey, PositionId, Timestamp};
  use serde::{Deserialize, Serialize};

  /// Configuration trait for the buyback engine pallet
  #[pallet::config]
  pub trait Config: frame_system::Config<RuntimeEvent: From<Event<Self>>> {
    /// The assets pallet holding both sold and acquired fungible tokens
    type Assets: FungiblesInspect<Self::AccountId, AssetId = AssetId, Balance = Balance>
      + FungiblesMutate<Self::AccountId, AssetId = AssetId, Balance = Balance>;

    /// The external TWAMM venue executing committed sale positions
    type Venue: TwammVenue<Self::AccountId>;

    /// Wall-clock source for order timing validation (unix seconds)
    type TimeProvider: UnixTime;

    /// Origin that can mutate the global and per-asset policies
    type AdminOrigin: EnsureOrigin<Self::RuntimeOrigin>;

    /// The pallet ID for the engine's sovereign account
    #[pallet::constant]
    type PalletId: Get<PalletId>;

    /// Weight information for extrinsics
    type WeightInfo: WeightInfo;

    /// Helper for benchmarking
    #[cfg(feature = "runtime-benchmarks")]
    type BenchmarkHelper: crate::BenchmarkHelper<Self::AccountId>;
  }

  /// The pallet struct
  #[pallet::pallet]
  pub struct Pallet<T>(PhantomData<T>);

  /// Order timing and amount policy, stored shape.
  ///
  /// Used both as the global default and as the optional per-asset override.
  /// `max_start_delay == 0` and `max_duration == 0` mean "no upper bound";
  /// the internal [`EffectivePolicy`] replaces that sentinel with a tagged
  /// optional before any comparison happens.
  #[derive(
    Clone,
    Encode,
    Decode,
    DecodeWithMemTracking,
    Eq,
    PartialEq,
    RuntimeDebug,
    TypeInfo,
    MaxEncodedLen,
    Serialize,
    Deserialize,
  )]
  pub struct BuybackPolicy<AccountId> {
    /// Asset accumulated by orders under this policy
    pub buy_asset: AssetId,
    /// Destination of claimed proceeds
    pub recipient: AccountId,
    /// Minimum sold-asset balance required to create an order
    pub min_sell_amount: Balance,
    /// Minimum delay between "now" and a future start time (0 = start may be immediate)
    pub min_start_delay: Timestamp,
    /// Maximum delay for a future start time (0 = unbounded)
    pub max_start_delay: Timestamp,
    /// Minimum order duration in seconds
    pub min_duration: Timestamp,
    /// Maximum order duration in seconds (0 = unbounded)
    pub max_duration: Timestamp,
    /// Venue fee tier orders under this policy trade through
    pub fee: FeeTier,
  }

  /// The policy actually applied to an order request. Computed on demand,
  /// never persisted; upper bounds are tagged optionals here.
  #[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
  pub struct EffectivePolicy<AccountId> {
    pub buy_asset: AssetId,
    pub recipient: AccountId,
    pub min_sell_amount: Balance,
    pub min_start_delay: Timestamp,
    pub max_start_delay: Option<Timestamp>,
    pub min_duration: Timestamp,
    pub max_duration: Option<Timestamp>,
    pub fee: FeeTier,
  }

  impl<AccountId> From<BuybackPolicy<AccountId>> for EffectivePolicy<AccountId> {
    fn from(p: BuybackPolicy<AccountId>) -> Self {
      let bound = |v: Timestamp| (v != 0).then_some(v);
      EffectivePolicy {
        buy_asset: p.buy_asset,
        recipient: p.recipient,
        min_sell_amount: p.min_sell_amount,
        min_start_delay: p.min_start_delay,
        max_start_delay: bound(p.max_start_delay),
        min_duration: p.min_duration,
        max_duration: bound(p.max_duration),
        fee: p.fee,
      }
    }
  }

  /// Per sold-asset accumulation state, created lazily on the first order
  /// and never deleted.
  ///
  /// While `bookmark < order_count` the locked pair is non-zero and equal to
  /// the values used by every unclaimed order; a full drain clears it, which
  /// is the sole moment a policy change takes effect on future orders.
  #[derive(
    Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen, Default,
  )]
  pub struct AccumulationState {
    /// Venue position id (0 = no position yet)
    pub position_id: PositionId,
    /// Count of orders ever created for this sold asset
    pub order_count: OrderIndex,
    /// Index of the first not-yet-claimed order
    pub bookmark: OrderIndex,
    /// Buy asset shared by all unclaimed orders (0 = unlocked)
    pub locked_buy_asset: AssetId,
    /// Fee tier shared by all unclaimed orders (0 when unlocked)
    pub locked_fee: FeeTier,
  }

  /// Compact per-order record. Buy asset and fee tier are deliberately not
  /// duplicated here; reads reconstruct them from the current lock, which is
  /// zero once the order is fully claimed.
  #[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
  pub struct OrderRecord {
    /// Requested start time (0 = immediate), as handed to the venue
    pub start_time: Timestamp,
    /// Order end time
    pub end_time: Timestamp,
    /// Sold amount committed at creation
    pub amount: Balance,
  }

  /// Fully reconstructed order view for the read surface.
  ///
  /// `buy_asset` and `fee` reflect the *current* lock of the sold asset:
  /// they are zero for orders whose ledger has since fully drained.
  #[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
  pub struct OrderInfo {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub amount: Balance,
    pub buy_asset: AssetId,
    pub fee: FeeTier,
  }

  /// Global default policy, set at genesis or by the admin origin
  #[pallet::storage]
  #[pallet::getter(fn global_policy)]
  pub type GlobalPolicy<T: Config> = StorageValue<_, BuybackPolicy<T::AccountId>, OptionQuery>;

  /// Optional per sold-asset policy override
  #[pallet::storage]
  #[pallet::getter(fn asset_policy)]
  pub type AssetPolicies<T: Config> =
    StorageMap<_, Blake2_128Concat, AssetId, BuybackPolicy<T::AccountId>, OptionQuery>;

  /// Accumulation state per sold asset
  #[pallet::storage]
  #[pallet::getter(fn accumulation)]
  pub type Accumulations<T: Config> =
    StorageMap<_, Blake2_128Concat, AssetId, AccumulationState, ValueQuery>;

  /// Append-only order ledger, indexed by sold asset and sequence number
  #[pallet::storage]
  #[pallet::getter(fn order)]
  pub type Orders<T: Config> = StorageDoubleMap<
    _,
    Blake2_128Concat,
    AssetId,
    Twox64Concat,
    OrderIndex,
    OrderRecord,
    OptionQuery,
  >;

  /// Events for the buyback engine pallet
  #[pallet::event]
  #[pallet::generate_deposit(pub(super) fn deposit_event)]
  pub enum Event<T: Config> {
    /// Global default policy replaced
    GlobalPolicyUpdated {
      old: Option<BuybackPolicy<T::AccountId>>,
      new: BuybackPolicy<T::AccountId>,
    },
    /// Per-asset policy override set or cleared
    AssetPolicyUpdated {
      sell_asset: AssetId,
      old: Option<BuybackPolicy<T::AccountId>>,
      new: Option<BuybackPolicy<T::AccountId>>,
    },
    /// A new order was appended to a sold asset's ledger
    OrderCreated {
      sell_asset: AssetId,
      index: OrderIndex,
      position_id: PositionId,
      buy_asset: AssetId,
      fee: FeeTier,
      start_time: Timestamp,
      end_time: Timestamp,
      amount: Balance,
    },
    /// Proceeds of completed orders were claimed
    ProceedsClaimed {
      sell_asset: AssetId,
      orders_claimed: u64,
      new_bookmark: OrderIndex,
      total_proceeds: Balance,
    },
    /// Untracked proceeds of the global buy asset were swept to the recipient
    Swept {
      asset: AssetId,
      amount: Balance,
      recipient: T::AccountId,
    },
  }

  /// Errors for the buyback engine pallet
  #[pallet::error]
  pub enum Error<T> {
    /// No global policy has been configured yet
    NotConfigured,
    /// Policy names the zero asset as the acquired asset
    ZeroBuyAsset,
    /// Policy has min_start_delay > max_start_delay with a bounded maximum
    InvalidDelayBounds,
    /// Policy has min_duration > max_duration with a bounded maximum
    InvalidDurationBounds,
    /// The sold asset is the zero sentinel
    ZeroSellAsset,
    /// The sold asset equals the effective acquired asset
    SellEqualsBuyAsset,
    /// Start time violates the minimum start delay
    StartTooSoon,
    /// Start time exceeds the maximum start delay
    StartTooLate,
    /// Requested end time is not after the actual start time
    EndBeforeStart,
    /// Order duration is below the policy minimum
    DurationTooShort,
    /// Order duration exceeds the bounded policy maximum
    DurationTooLong,
    /// The engine holds no balance of the sold asset
    NothingToSell,
    /// The engine's sold-asset balance is below the policy minimum
    BelowMinimumAmount,
    /// Effective acquired asset differs from the outstanding lock
    LockedBuyAssetMismatch,
    /// Effective fee tier differs from the outstanding lock
    LockedFeeMismatch,
    /// No venue position exists for the sold asset
    NoVenuePosition,
    /// All orders for the sold asset are already claimed
    NothingToClaim,
    /// No unclaimed order has reached its end time yet
    NoOrdersCompleted,
    /// Ledger integrity failure: an unclaimed index has no record
    OrderMissing,
    /// The engine holds no balance of the global buy asset
    NothingToSweep,
  }

  #[pallet::call]
  impl<T: Config> Pallet<T> {
    /// Replace the global default policy (admin only).
    #[pallet::call_index(0)]
    #[pallet::weight(T::WeightInfo::set_global_policy())]
    pub fn set_global_policy(
      origin: OriginFor<T>,
      policy: BuybackPolicy<T::AccountId>,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      Self::validate_policy(&policy)?;
      let old = GlobalPolicy::<T>::get();
      GlobalPolicy::<T>::put(&policy);
      Self::deposit_event(Event::GlobalPolicyUpdated { old, new: policy });
      Ok(())
    }

    /// Set or clear the policy override for one sold asset (admin only).
    #[pallet::call_index(1)]
    #[pallet::weight(T::WeightInfo::set_asset_policy())]
    pub fn set_asset_policy(
      origin: OriginFor<T>,
      sell_asset: AssetId,
      policy: Option<BuybackPolicy<T::AccountId>>,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      ensure!(sell_asset != NO_ASSET, Error::<T>::ZeroSellAsset);
      if let Some(p) = &policy {
        Self::validate_policy(p)?;
      }
      let old = match &policy {
        Some(p) => AssetPolicies::<T>::mutate(sell_asset, |slot| slot.replace(p.clone())),
        None => AssetPolicies::<T>::take(sell_asset),
      };
      Self::deposit_event(Event::AssetPolicyUpdated {
        sell_asset,
        old,
        new: policy,
      });
      Ok(())
    }

    /// Commit the engine's entire balance of `sell_asset` to a new
    /// time-windowed sale on the venue. Permissionless.
    ///
    /// `start_time == 0` means "as soon as possible"; `end_time` is the
    /// wall-clock second at which the order finishes. The order's duration
    /// is measured from `max(now, start_time)`, so end times in the ledger
    /// are non-decreasing in creation order.
    #[pallet::call_index(2)]
    #[pallet::weight(T::WeightInfo::create_order())]
    pub fn create_order(
      origin: OriginFor<T>,
      sell_asset: AssetId,
      start_time: Timestamp,
      end_time: Timestamp,
    ) -> DispatchResult {
      ensure_signed(origin)?;
      let policy = Self::effective_policy(sell_asset).ok_or(Error::<T>::NotConfigured)?;
      ensure!(sell_asset != NO_ASSET, Error::<T>::ZeroSellAsset);
      ensure!(sell_asset != policy.buy_asset, Error::<T>::SellEqualsBuyAsset);

      let now = Self::now();
      let resolved_start = if start_time == 0 { now } else { start_time };
      if policy.min_start_delay > 0 {
        // A resolved "now" start can never satisfy a positive minimum delay.
        ensure!(resolved_start > now, Error::<T>::StartTooSoon);
        ensure!(
          resolved_start - now >= policy.min_start_delay,
          Error::<T>::StartTooSoon
        );
      }
      if resolved_start > now {
        if let Some(max_delay) = policy.max_start_delay {
          ensure!(resolved_start - now <= max_delay, Error::<T>::StartTooLate);
        }
      }
      let actual_start = resolved_start.max(now);
      ensure!(end_time > actual_start, Error::<T>::EndBeforeStart);
      let duration = end_time - actual_start;
      ensure!(duration >= policy.min_duration, Error::<T>::DurationTooShort);
      if let Some(max_duration) = policy.max_duration {
        ensure!(duration <= max_duration, Error::<T>::DurationTooLong);
      }

      let engine = Self::account_id();
      let amount = T::Assets::balance(sell_asset, &engine);
      ensure!(!amount.is_zero(), Error::<T>::NothingToSell);
      ensure!(amount >= policy.min_sell_amount, Error::<T>::BelowMinimumAmount);

      let mut state = Accumulations::<T>::get(sell_asset);
      if state.locked_buy_asset == NO_ASSET {
        state.locked_buy_asset = policy.buy_asset;
        state.locked_fee = policy.fee;
      } else {
        // Every order on one venue position must share one buy asset and
        // fee tier; a policy change only lands after a full drain.
        ensure!(
          state.locked_buy_asset == policy.buy_asset,
          Error::<T>::LockedBuyAssetMismatch
        );
        ensure!(state.locked_fee == policy.fee, Error::<T>::LockedFeeMismatch);
      }
      let (buy_asset, fee) = (state.locked_buy_asset, state.locked_fee);

      // Append before the venue sub-call. The extrinsic is one atomic unit,
      // so a venue failure reverts the record along with everything else,
      // and a re-entering call observes a fully consistent ledger.
      let index = state.order_count;
      Orders::<T>::insert(
        sell_asset,
        index,
        OrderRecord {
          start_time,
          end_time,
          amount,
        },
      );
      state.order_count = index.saturating_add(1);

      // The venue receives the raw requested start, not the resolved one:
      // its own time-validity rules expect the zero-or-explicit value.
      let key = OrderKey {
        sell_asset,
        buy_asset,
        fee,
        start_time,
        end_time,
      };
      let (position_id, _rate) = T::Venue::create_or_extend(&engine, key, amount)?;
      state.position_id = position_id;
      Accumulations::<T>::insert(sell_asset, state);

      Self::deposit_event(Event::OrderCreated {
        sell_asset,
        index,
        position_id,
        buy_asset,
        fee,
        start_time,
        end_time,
        amount,
      });
      Ok(())
    }

    /// Claim proceeds of completed orders for `sell_asset`, walking the
    /// ledger from the bookmark. Permissionless.
    ///
    /// `limit == 0` means "all unclaimed orders". The walk stops early at
    /// the first order whose end time is still in the future; the remaining
    /// orders cannot be complete either, since end times are non-decreasing.
    #[pallet::call_index(3)]
    #[pallet::weight(T::WeightInfo::claim())]
    pub fn claim(origin: OriginFor<T>, sell_asset: AssetId, limit: u64) -> DispatchResult {
      ensure_signed(origin)?;
      let mut state = Accumulations::<T>::get(sell_asset);
      ensure!(state.position_id != 0, Error::<T>::NoVenuePosition);
      ensure!(state.bookmark < state.order_count, Error::<T>::NothingToClaim);
      let policy = Self::effective_policy(sell_asset).ok_or(Error::<T>::NotConfigured)?;

      let upper = if limit == 0 {
        state.order_count
      } else {
        state.order_count.min(state.bookmark.saturating_add(limit))
      };
      let now = Self::now();
      // One destination for the whole batch; policy cannot change mid-call.
      let recipient = policy.recipient;
      let mut total: Balance = 0;
      let mut index = state.bookmark;
      while index < upper {
        let record = Orders::<T>::get(sell_asset, index).ok_or(Error::<T>::OrderMissing)?;
        if record.end_time > now {
          break;
        }
        let key = OrderKey {
          sell_asset,
          buy_asset: state.locked_buy_asset,
          fee: state.locked_fee,
          start_time: record.start_time,
          end_time: record.end_time,
        };
        let proceeds = T::Venue::withdraw(state.position_id, key, &recipient)?;
        total = total.saturating_add(proceeds);
        index += 1;
      }
      ensure!(index > state.bookmark, Error::<T>::NoOrdersCompleted);

      let orders_claimed = index - state.bookmark;
      state.bookmark = index;
      if state.bookmark == state.order_count {
        // Fully drained: release the lock so the next order may adopt the
        // then-current effective policy.
        state.locked_buy_asset = NO_ASSET;
        state.locked_fee = 0;
      }
      Accumulations::<T>::insert(sell_asset, state);

      Self::deposit_event(Event::ProceedsClaimed {
        sell_asset,
        orders_claimed,
        new_bookmark: index,
        total_proceeds: total,
      });
      Ok(())
    }

    /// Sweep the engine's entire balance of the *global* buy asset to the
    /// global recipient. Permissionless.
    ///
    /// Rescues proceeds received out-of-band that were never tied to an
    /// order. Acquired assets of per-asset overrides are out of reach here.
    #[pallet::call_index(4)]
    #[pallet::weight(T::WeightInfo::sweep())]
    pub fn sweep(origin: OriginFor<T>) -> DispatchResult {
      ensure_signed(origin)?;
      let policy = GlobalPolicy::<T>::get().ok_or(Error::<T>::NotConfigured)?;
      let engine = Self::account_id();
      let amount = T::Assets::balance(policy.buy_asset, &engine);
      ensure!(!amount.is_zero(), Error::<T>::NothingToSweep);
      T::Assets::transfer(
        policy.buy_asset,
        &engine,
        &policy.recipient,
        amount,
        Preservation::Expendable,
      )?;
      Self::deposit_event(Event::Swept {
        asset: policy.buy_asset,
        amount,
        recipient: policy.recipient,
      });
      Ok(())
    }
  }

  impl<T: Config> Pallet<T> {
    /// The engine's sovereign account, holder of sold-asset balances.
    pub fn account_id() -> T::AccountId {
      T::PalletId::get().into_account_truncating()
    }

    /// Current wall-clock time in unix seconds.
    pub fn now() -> Timestamp {
      T::TimeProvider::now().as_secs()
    }

    /// The policy applied to requests for `sell_asset`: the per-asset
    /// override verbatim if present, else the global default projected into
    /// the same shape. `None` if the engine was never configured.
    pub fn effective_policy(sell_asset: AssetId) -> Option<EffectivePolicy<T::AccountId>> {
      AssetPolicies::<T>::get(sell_asset)
        .or_else(GlobalPolicy::<T>::get)
        .map(Into::into)
    }

    /// Number of orders for `sell_asset` not yet claimed.
    pub fn unclaimed_orders(sell_asset: AssetId) -> u64 {
      let state = Accumulations::<T>::get(sell_asset);
      state.order_count.saturating_sub(state.bookmark)
    }

    /// Reconstructed view of one order. `buy_asset` and `fee` reflect the
    /// current lock and read as zero once the ledger has fully drained.
    pub fn order_info(sell_asset: AssetId, index: OrderIndex) -> Option<OrderInfo> {
      let record = Orders::<T>::get(sell_asset, index)?;
      let state = Accumulations::<T>::get(sell_asset);
      Some(OrderInfo {
        start_time: record.start_time,
        end_time: record.end_time,
        amount: record.amount,
        buy_asset: state.locked_buy_asset,
        fee: state.locked_fee,
      })
    }

    fn validate_policy(policy: &BuybackPolicy<T::AccountId>) -> DispatchResult {
      ensure!(policy.buy_asset != NO_ASSET, Error::<T>::ZeroBuyAsset);
      if policy.max_start_delay != 0 {
        ensure!(
          policy.min_start_delay <= policy.max_start_delay,
          Error::<T>::InvalidDelayBounds
        );
      }
      if policy.max_duration != 0 {
        ensure!(
          policy.min_duration <= policy.max_duration,
          Error::<T>::InvalidDurationBounds
        );
      }
      Ok(())
    }
  }

  /// Genesis configuration — pallet account provider reference plus an
  /// optional initial global policy
  #[pallet::genesis_config]
  #[derive(frame::prelude::DefaultNoBound)]
  pub struct GenesisConfig<T: Config> {
    pub global_policy: Option<BuybackPolicy<T::AccountId>>,
  }

  #[pallet::genesis_build]
  impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
    fn build(&self) {
      // Pallet account survives zero native balance via provider reference
      frame_system::Pallet::<T>::inc_providers(&Pallet::<T>::account_id());
      if let Some(policy) = &self.global_policy {
        Pallet::<T>::validate_policy(policy).expect("genesis buyback policy is invalid");
        GlobalPolicy::<T>::put(policy);
      }
    }
  }
}
