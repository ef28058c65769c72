//! Ecosystem Constants for the Buyback Engine workspace
//!
//! This module centralizes system-level constants: pallet IDs for deriving
//! pallet-owned accounts and the fundamental economic parameters shared by
//! the engine pallet, its tests, and runtime configurations.

pub use crate::assets::Balance;

/// Pallet identifiers for deriving pallet-owned accounts.
///
/// These IDs are used by Polkadot SDK's `PalletId::into_account_truncating()`
/// to deterministically generate accounts for pallet-specific operations.
pub mod pallet_ids {
  /// Buyback Engine pallet ID (holds sold-asset balances awaiting commitment)
  pub const BUYBACK_PALLET_ID: &[u8; 8] = b"buybckng";
}

/// Ecosystem parameters defining mathematical constants and default thresholds.
pub mod params {
  use super::Balance;

  /// Precision scalar for balance-denominated values (10^12).
  ///
  /// One whole token in base units, assuming twelve decimals. Defaults and
  /// tests express amounts as multiples of this constant.
  pub const PRECISION: Balance = 1_000_000_000_000;

  /// Default minimum sold-asset balance required to create an order (1.0).
  ///
  /// Prevents spam orders that would fragment the venue position into
  /// economically meaningless slices.
  pub const BUYBACK_MIN_SELL_AMOUNT: Balance = PRECISION;

  /// Default minimum order duration in seconds (~10 minutes).
  pub const BUYBACK_MIN_DURATION: u64 = 600;

  /// Default venue fee tier in pips (0.3%).
  pub const BUYBACK_DEFAULT_FEE: u32 = 3_000;
}
