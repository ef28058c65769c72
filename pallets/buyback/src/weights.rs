#![cfg_attr(rustfmt, rustfmt_skip)]
#![allow(unused_parens)]
#![allow(unused_imports)]
#![allow(missing_docs)]

use polkadot_sdk::frame_support::{traits::Get, weights::{Weight, constants::RocksDbWeight}};
use core::marker::PhantomData;

pub trait WeightInfo {
	fn set_global_policy() -> Weight;
	fn set_asset_policy() -> Weight;
	fn create_order() -> Weight;
	fn claim() -> Weight;
	fn sweep() -> Weight;
}

pub struct SubstrateWeight<T>(PhantomData<T>);
impl<T: polkadot_sdk::frame_system::Config> WeightInfo for SubstrateWeight<T> {
	fn set_global_policy() -> Weight {
		Weight::from_parts(15_000_000, 1500)
			.saturating_add(T::DbWeight::get().reads(1))
			.saturating_add(T::DbWeight::get().writes(1))
	}
	fn set_asset_policy() -> Weight {
		Weight::from_parts(15_000_000, 1500)
			.saturating_add(T::DbWeight::get().reads(1))
			.saturating_add(T::DbWeight::get().writes(1))
	}
	fn create_order() -> Weight {
		Weight::from_parts(80_000_000, 4000)
			.saturating_add(T::DbWeight::get().reads(5))
			.saturating_add(T::DbWeight::get().writes(4))
	}
	fn claim() -> Weight {
		Weight::from_parts(90_000_000, 4000)
			.saturating_add(T::DbWeight::get().reads(4))
			.saturating_add(T::DbWeight::get().writes(3))
	}
	fn sweep() -> Weight {
		Weight::from_parts(40_000_000, 3000)
			.saturating_add(T::DbWeight::get().reads(2))
			.saturating_add(T::DbWeight::get().writes(2))
	}
}

impl WeightInfo for () {
	fn set_global_policy() -> Weight {
		Weight::from_parts(15_000_000, 1500)
	}
	fn set_asset_policy() -> Weight {
		Weight::from_parts(15_000_000, 1500)
	}
	fn create_order() -> Weight {
		Weight::from_parts(80_000_000, 4000)
	}
	fn claim() -> Weight {
		Weight::from_parts(90_000_000, 4000)
	}
	fn sweep() -> Weight {
		Weight::from_parts(40_000_000, 3000)
	}
}
