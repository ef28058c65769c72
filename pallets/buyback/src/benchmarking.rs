use crate::*;
use polkadot_sdk::frame_benchmarking::v2::*;
use polkadot_sdk::frame_system::RawOrigin;
use polkadot_sdk::pallet_timestamp;
use primitives::params::PRECISION;

const BUY: AssetId = 1;
const SELL: AssetId = 2;

fn bench_policy<T: Config>() -> pallet::BuybackPolicy<T::AccountId> {
  pallet::BuybackPolicy {
    buy_asset: BUY,
    recipient: account("recipient", 0, 0),
    min_sell_amount: 1,
    min_start_delay: 0,
    max_start_delay: 0,
    min_duration: 0,
    max_duration: 0,
    fee: 3_000,
  }
}

fn setup_sellable<T: Config>() {
  Pallet::<T>::set_global_policy(RawOrigin::Root.into(), bench_policy::<T>())
    .expect("Failed to set global policy");
  T::BenchmarkHelper::create_asset(BUY).expect("Failed to create buy asset");
  T::BenchmarkHelper::create_asset(SELL).expect("Failed to create sell asset");
  T::BenchmarkHelper::fund_account(&Pallet::<T>::account_id(), SELL, 1_000 * PRECISION)
    .expect("Failed to fund engine");
}

#[benchmarks(where T: pallet_timestamp::Config<Moment = u64>)]
mod benches {
  use super::*;

  #[benchmark]
  fn set_global_policy() {
    let policy = bench_policy::<T>();

    #[extrinsic_call]
    set_global_policy(RawOrigin::Root, policy.clone());

    assert_eq!(pallet::GlobalPolicy::<T>::get(), Some(policy));
  }

  #[benchmark]
  fn set_asset_policy() {
    let policy = bench_policy::<T>();

    #[extrinsic_call]
    set_asset_policy(RawOrigin::Root, SELL, Some(policy.clone()));

    assert_eq!(pallet::AssetPolicies::<T>::get(SELL), Some(policy));
  }

  #[benchmark]
  fn create_order() {
    setup_sellable::<T>();
    pallet_timestamp::Now::<T>::put(1_000_000u64); // 1_000 s
    let caller: T::AccountId = whitelisted_caller();

    #[extrinsic_call]
    create_order(RawOrigin::Signed(caller), SELL, 0, 2_000);

    assert_eq!(pallet::Accumulations::<T>::get(SELL).order_count, 1);
  }

  #[benchmark]
  fn claim() {
    setup_sellable::<T>();
    pallet_timestamp::Now::<T>::put(1_000_000u64);
    let caller: T::AccountId = whitelisted_caller();
    Pallet::<T>::create_order(RawOrigin::Signed(caller.clone()).into(), SELL, 0, 2_000)
      .expect("Failed to create order");
    pallet_timestamp::Now::<T>::put(2_000_000u64);

    #[extrinsic_call]
    claim(RawOrigin::Signed(caller), SELL, 0);

    assert_eq!(pallet::Accumulations::<T>::get(SELL).bookmark, 1);
  }

  #[benchmark]
  fn sweep() {
    Pallet::<T>::set_global_policy(RawOrigin::Root.into(), bench_policy::<T>())
      .expect("Failed to set global policy");
    T::BenchmarkHelper::create_asset(BUY).expect("Failed to create buy asset");
    T::BenchmarkHelper::fund_account(&Pallet::<T>::account_id(), BUY, 10 * PRECISION)
      .expect("Failed to fund engine");
    let caller: T::AccountId = whitelisted_caller();

    #[extrinsic_call]
    sweep(RawOrigin::Signed(caller));
  }

  #[cfg(test)]
  use crate::mock::{Test, new_test_ext};
  #[cfg(test)]
  impl_benchmark_test_suite!(Pallet, new_test_ext(), Test);
}
