// Memoization contracts of the network facade: scalar results compute once,
// indexed results are keyed by exact frequency match, and the probe/result
// lists stay in lockstep even when a computation fails.

mod common;

use common::{analysis_params, init_logging, two_population_network_params, CountingAnalytics};
use meanfield::{Network, Probe, Quantity, Unit, UnitSystem};

fn counting_network() -> (Network<CountingAnalytics>, CountingAnalytics) {
    let analytics = CountingAnalytics::new();
    let network = Network::new(
        two_population_network_params(),
        analysis_params(),
        analytics.clone(),
        UnitSystem::new(),
    )
    .unwrap();
    (network, analytics)
}

#[test]
fn firing_rates_are_idempotent_and_computed_once() {
    init_logging();
    let (mut net, analytics) = counting_network();

    let first = net.firing_rates().unwrap();
    let second = net.firing_rates().unwrap();

    assert_eq!(first, second);
    assert_eq!(analytics.counters.borrow().firing_rates, 1);
}

#[test]
fn working_point_reuses_all_scalar_results() {
    init_logging();
    let (mut net, analytics) = counting_network();

    let wp1 = net.working_point().unwrap();
    let wp2 = net.working_point().unwrap();

    assert_eq!(wp1, wp2);
    let counters = analytics.counters.borrow();
    assert_eq!(counters.firing_rates, 1);
    assert_eq!(counters.mean_input, 1);
    assert_eq!(counters.std_input, 1);
}

#[test]
fn repeated_frequency_probe_hits_the_indexed_cache() {
    init_logging();
    let (mut net, analytics) = counting_network();

    let f1 = Quantity::scalar(10.0, Unit::Hertz);
    let f2 = Quantity::scalar(20.0, Unit::Hertz);

    let first = net.transfer_function_at(&f1).unwrap();
    let lens = net.cache().series_lens("transfer_function_single").unwrap();
    assert_eq!(lens, (1, 1));

    net.transfer_function_at(&f2).unwrap();
    let lens = net.cache().series_lens("transfer_function_single").unwrap();
    assert_eq!(lens, (2, 2));

    let third = net.transfer_function_at(&f1).unwrap();
    let lens = net.cache().series_lens("transfer_function_single").unwrap();
    assert_eq!(lens, (2, 2));

    assert_eq!(first, third);
    // two misses -> exactly two underlying transfer function evaluations
    assert_eq!(analytics.counters.borrow().transfer_function, 2);
}

#[test]
fn grid_and_single_frequency_caches_are_independent() {
    init_logging();
    let (mut net, analytics) = counting_network();

    net.transfer_function().unwrap();
    net.transfer_function_at(&Quantity::scalar(1.0, Unit::Hertz))
        .unwrap();
    net.transfer_function().unwrap();

    // one grid evaluation plus one single-frequency evaluation
    assert_eq!(analytics.counters.borrow().transfer_function, 2);
    let names = net.show();
    assert!(names.contains(&"transfer_function".to_string()));
    assert!(names.contains(&"transfer_function_single".to_string()));
}

#[test]
fn delay_dist_probes_track_results() {
    init_logging();
    let (mut net, _) = counting_network();

    for f in [3.0, 7.0, 3.0, 11.0, 7.0] {
        net.delay_dist_matrix_at(&Quantity::scalar(f, Unit::Hertz))
            .unwrap();
        let (probes, results) = net.cache().series_lens("delay_dist_single").unwrap();
        assert_eq!(probes, results);
    }
    assert_eq!(net.cache().series_lens("delay_dist_single").unwrap(), (3, 3));

    // the probe list records misses only, in first-seen order
    let probed: Vec<f64> = net
        .cache()
        .probes("delay_dist_single")
        .unwrap()
        .iter()
        .map(|p| match p {
            Probe::Frequency { magnitude, .. } => *magnitude,
            other => panic!("unexpected probe {:?}", other),
        })
        .collect();
    assert_eq!(probed, vec![3.0, 7.0, 11.0]);
}

#[test]
fn show_lists_cached_results_sorted() {
    init_logging();
    let (mut net, _) = counting_network();
    assert!(net.show().is_empty());

    net.power_spectra().unwrap();

    let names = net.show();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    // power spectra pull in their dependencies
    for expected in [
        "delay_dist",
        "firing_rates",
        "mu",
        "power_spectra",
        "sigma",
        "transfer_function",
    ] {
        assert!(names.contains(&expected.to_string()), "missing {}", expected);
    }
}
