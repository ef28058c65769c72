use codec::{Decode, DecodeWithMemTracking, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

/// Asset identifier as used by `pallet-assets` across the workspace.
///
/// `0` is reserved as the "unset" sentinel: it is never a valid tradable
/// asset and doubles as the cleared state of the engine's buy-asset lock.
pub type AssetId = u32;

/// Balance type alias for consistency across the ecosystem.
pub type Balance = u128;

/// Unix timestamp in seconds, matching the venue's own time representation.
pub type Timestamp = u64;

/// Venue fee tier in pips (parts per million of the traded amount).
pub type FeeTier = u32;

/// Identifier of a long-term sale position on the venue. `0` means "none yet".
pub type PositionId = u64;

/// Index of an order in a sold asset's append-only ledger.
pub type OrderIndex = u64;

/// The "unset asset" sentinel.
pub const NO_ASSET: AssetId = 0;

/// Venue-facing key identifying one time-windowed sale.
///
/// The venue addresses orders by this full tuple, so it must be reproduced
/// bit-for-bit at withdrawal time from the ledger plus the buy-asset lock.
/// `start_time` carries the raw requested value (`0` = immediate), not a
/// locally resolved "now" — the venue applies its own time-validity rules.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  MaxEncodedLen,
  Ord,
  PartialEq,
  PartialOrd,
  TypeInfo,
  Serialize,
  Deserialize,
)]
pub struct OrderKey {
  /// Asset being sold off gradually.
  pub sell_asset: AssetId,
  /// Asset being accumulated.
  pub buy_asset: AssetId,
  /// Venue fee tier of the pool the order trades through.
  pub fee: FeeTier,
  /// Requested start time (0 = as soon as possible).
  pub start_time: Timestamp,
  /// Time at which the order finishes executing.
  pub end_time: Timestamp,
}
