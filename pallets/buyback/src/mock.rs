extern crate alloc;

use crate as pallet_buyback;
use crate::TwammVenue;
use polkadot_sdk::frame_support::traits::fungibles::Mutate;
use polkadot_sdk::frame_support::traits::tokens::{Fortitude, Precision, Preservation};
use polkadot_sdk::frame_support::{
  PalletId, construct_runtime, derive_impl,
  traits::{ConstU32, ConstU64, ConstU128},
};
use polkadot_sdk::frame_system;
use polkadot_sdk::sp_runtime::{
  BuildStorage, DispatchError,
  testing::H256,
  traits::{BlakeTwo256, IdentityLookup},
};
use primitives::{AssetId, Balance, OrderKey, PositionId, pallet_ids, params::PRECISION};
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Global default acquired asset
pub const BUY: AssetId = 1;
/// Sold asset used by most tests
pub const SELL: AssetId = 2;
/// Alternative acquired asset for per-asset overrides
pub const OTHER_BUY: AssetId = 3;
/// Global proceeds recipient
pub const TREASURY: u64 = 777;
/// Proceeds paid out per withdrawn order unless overridden
pub const DEFAULT_PROCEEDS: Balance = 10 * PRECISION;

// State containers for the stateful venue mock
thread_local! {
    // One venue position per sold asset
    static POSITIONS: RefCell<BTreeMap<AssetId, PositionId>> = const { RefCell::new(BTreeMap::new()) };

    static NEXT_POSITION_ID: RefCell<PositionId> = const { RefCell::new(1) };

    // Full order keys and amounts handed to the venue, in call order
    static COMMITTED: RefCell<Vec<(OrderKey, Balance)>> = const { RefCell::new(Vec::new()) };

    // Withdraw calls, in call order (for double-withdrawal assertions)
    static WITHDRAWN: RefCell<Vec<(PositionId, OrderKey)>> = const { RefCell::new(Vec::new()) };

    // Proceeds override per (start_time, end_time) window
    static PROCEEDS: RefCell<BTreeMap<(u64, u64), Balance>> = const { RefCell::new(BTreeMap::new()) };
}

/// Override the proceeds the venue pays out for one order window
pub fn set_order_proceeds(start_time: u64, end_time: u64, amount: Balance) {
  PROCEEDS.with(|p| p.borrow_mut().insert((start_time, end_time), amount));
}

/// Order keys and amounts the venue has received so far
pub fn venue_commitments() -> Vec<(OrderKey, Balance)> {
  COMMITTED.with(|c| c.borrow().clone())
}

/// Withdraw calls the venue has served so far
pub fn venue_withdrawals() -> Vec<(PositionId, OrderKey)> {
  WITHDRAWN.with(|w| w.borrow().clone())
}

/// Advance mock wall-clock time to `secs` (unix seconds)
pub fn set_now(secs: u64) {
  Timestamp::set_timestamp(secs * 1_000);
}

type Block = frame_system::mocking::MockBlock<Test>;

construct_runtime!(
  pub struct Test {
    System: frame_system,
    Balances: polkadot_sdk::pallet_balances,
    Assets: polkadot_sdk::pallet_assets,
    Timestamp: polkadot_sdk::pallet_timestamp,
    Buyback: pallet_buyback,
  }
);

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Test {
  type Block = Block;
  type AccountId = u64;
  type Lookup = IdentityLookup<Self::AccountId>;
  type Hash = H256;
  type Hashing = BlakeTwo256;
  type AccountData = polkadot_sdk::pallet_balances::AccountData<u128>;
}

impl polkadot_sdk::pallet_balances::Config for Test {
  type MaxLocks = ();
  type MaxReserves = ();
  type ReserveIdentifier = [u8; 8];
  type Balance = u128;
  type DustRemoval = ();
  type RuntimeEvent = RuntimeEvent;
  type ExistentialDeposit = ConstU128<1>;
  type AccountStore = System;
  type WeightInfo = ();
  type FreezeIdentifier = ();
  type MaxFreezes = ();
  type RuntimeHoldReason = ();
  type RuntimeFreezeReason = ();
  type DoneSlashHandler = ();
}

impl polkadot_sdk::pallet_assets::Config for Test {
  type RuntimeEvent = RuntimeEvent;
  type Balance = u128;
  type AssetId = u32;
  type AssetIdParameter = u32;
  type Currency = Balances;
  type CreateOrigin = polkadot_sdk::frame_support::traits::AsEnsureOriginWithArg<
    frame_system::EnsureSigned<Self::AccountId>,
  >;
  type ForceOrigin = frame_system::EnsureRoot<Self::AccountId>;
  type AssetDeposit = ConstU128<1>;
  type AssetAccountDeposit = ConstU128<1>;
  type MetadataDepositBase = ConstU128<1>;
  type MetadataDepositPerByte = ConstU128<1>;
  type ApprovalDeposit = ConstU128<1>;
  type StringLimit = ConstU32<50>;
  type Freezer = ();
  type Extra = ();
  type ReserveData = ();
  type CallbackHandle = ();
  type WeightInfo = ();
  type RemoveItemsLimit = ConstU32<5>;
  type Holder = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = AssetBenchmarkHelper;
}

#[cfg(feature = "runtime-benchmarks")]
pub struct AssetBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl polkadot_sdk::pallet_assets::BenchmarkHelper<u32, ()> for AssetBenchmarkHelper {
  fn create_asset_id_parameter(id: u32) -> u32 {
    id
  }
  fn create_reserve_id_parameter(_id: u32) -> () {
    ()
  }
}

impl polkadot_sdk::pallet_timestamp::Config for Test {
  type Moment = u64;
  type OnTimestampSet = ();
  type MinimumPeriod = ConstU64<1>;
  type WeightInfo = ();
}

/// Stateful venue mock: one position per sold asset, proceeds configurable
/// per order window, every call recorded.
pub struct MockVenue;
impl TwammVenue<u64> for MockVenue {
  fn create_or_extend(
    who: &u64,
    key: OrderKey,
    amount: Balance,
  ) -> Result<(PositionId, Balance), DispatchError> {
    // The engine hands over its full sold-asset balance; model the venue
    // side as a burn from the engine account.
    <Assets as Mutate<u64>>::burn_from(
      key.sell_asset,
      who,
      amount,
      Preservation::Expendable,
      Precision::Exact,
      Fortitude::Polite,
    )?;
    let position_id = POSITIONS.with(|p| {
      *p.borrow_mut().entry(key.sell_asset).or_insert_with(|| {
        NEXT_POSITION_ID.with(|n| {
          let id = *n.borrow();
          *n.borrow_mut() = id + 1;
          id
        })
      })
    });
    COMMITTED.with(|c| c.borrow_mut().push((key, amount)));
    let duration = key.end_time.saturating_sub(key.start_time).max(1);
    let rate = amount / duration as u128;
    Ok((position_id, rate))
  }

  fn withdraw(
    position_id: PositionId,
    key: OrderKey,
    recipient: &u64,
  ) -> Result<Balance, DispatchError> {
    let known = POSITIONS.with(|p| p.borrow().get(&key.sell_asset).copied());
    if known != Some(position_id) {
      return Err(DispatchError::Other("unknown venue position"));
    }
    let proceeds = PROCEEDS.with(|p| {
      p.borrow()
        .get(&(key.start_time, key.end_time))
        .copied()
        .unwrap_or(DEFAULT_PROCEEDS)
    });
    <Assets as Mutate<u64>>::mint_into(key.buy_asset, recipient, proceeds)?;
    WITHDRAWN.with(|w| w.borrow_mut().push((position_id, key)));
    Ok(proceeds)
  }
}

pub struct PalletIdStub;
impl polkadot_sdk::frame_support::traits::Get<PalletId> for PalletIdStub {
  fn get() -> PalletId {
    PalletId(*pallet_ids::BUYBACK_PALLET_ID)
  }
}

impl pallet_buyback::Config for Test {
  type Assets = Assets;
  type Venue = MockVenue;
  type TimeProvider = Timestamp;
  type AdminOrigin = frame_system::EnsureRoot<u64>;
  type PalletId = PalletIdStub;
  type WeightInfo = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = BuybackBenchmarkHelper;
}

#[cfg(feature = "runtime-benchmarks")]
pub struct BuybackBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl crate::BenchmarkHelper<u64> for BuybackBenchmarkHelper {
  fn create_asset(asset: AssetId) -> polkadot_sdk::sp_runtime::DispatchResult {
    let _ = Assets::force_create(frame_system::RawOrigin::Root.into(), asset, 1, true, 1);
    Ok(())
  }
  fn fund_account(who: &u64, asset: AssetId, amount: Balance) -> polkadot_sdk::sp_runtime::DispatchResult {
    Assets::mint_into(asset, who, amount)?;
    Ok(())
  }
}

/// Global policy used by most tests: buy BUY for TREASURY, one-token
/// minimum, immediate starts allowed, ten-minute minimum duration, no
/// upper bounds, 0.3% fee tier.
pub fn default_policy() -> pallet_buyback::BuybackPolicy<u64> {
  pallet_buyback::BuybackPolicy {
    buy_asset: BUY,
    recipient: TREASURY,
    min_sell_amount: primitives::params::BUYBACK_MIN_SELL_AMOUNT,
    min_start_delay: 0,
    max_start_delay: 0,
    min_duration: primitives::params::BUYBACK_MIN_DURATION,
    max_duration: 0,
    fee: primitives::params::BUYBACK_DEFAULT_FEE,
  }
}

pub fn new_test_ext() -> polkadot_sdk::sp_io::TestExternalities {
  new_test_ext_with(None)
}

/// Build externalities with an optional genesis global policy
pub fn new_test_ext_with(
  global_policy: Option<pallet_buyback::BuybackPolicy<u64>>,
) -> polkadot_sdk::sp_io::TestExternalities {
  let mut t = frame_system::GenesisConfig::<Test>::default()
    .build_storage()
    .unwrap();

  polkadot_sdk::pallet_assets::GenesisConfig::<Test> {
    assets: alloc::vec![
      (BUY, 1, true, 1),
      (SELL, 1, true, 1),
      (OTHER_BUY, 1, true, 1),
    ],
    metadata: alloc::vec![],
    accounts: alloc::vec![],
    reserves: alloc::vec![],
    next_asset_id: None,
  }
  .assimilate_storage(&mut t)
  .unwrap();

  pallet_buyback::GenesisConfig::<Test> { global_policy }
    .assimilate_storage(&mut t)
    .unwrap();

  // Reset venue state
  POSITIONS.with(|p| p.borrow_mut().clear());
  NEXT_POSITION_ID.with(|n| *n.borrow_mut() = 1);
  COMMITTED.with(|c| c.borrow_mut().clear());
  WITHDRAWN.with(|w| w.borrow_mut().clear());
  PROCEEDS.with(|p| p.borrow_mut().clear());

  t.into()
}
