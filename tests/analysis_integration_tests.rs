use pair_intervals::analysis::{
    AnalysisError, BandwidthLineExtractor, CounterLineExtractor, Diagnostics, FlowSeriesAligner,
    RunReport, SourceId, aggregate_flows, parse_counter_log, parse_flow_log,
};
use std::collections::BTreeMap;

/// Builds an iperf client log with one report per interval and a closing summary
fn iperf_log(port: u32, interval: f64, rates_mbps: &[f64]) -> String {
    let mut lines = vec![
        "------------------------------------------------------------".to_string(),
        "Client connecting to 10.0.0.2, TCP port 5001".to_string(),
        "------------------------------------------------------------".to_string(),
        format!("[{:3}] local 10.0.0.1 port 5{} connected with 10.0.0.2 port 5001", port, port),
        "[ ID] Interval       Transfer     Bandwidth".to_string(),
    ];
    for (i, rate) in rates_mbps.iter().enumerate() {
        let start = i as f64 * interval;
        let stop = (i + 1) as f64 * interval;
        lines.push(format!(
            "[{:3}] {:4.1}-{:4.1} sec   512 KBytes  {:.2} Mbits/sec",
            port, start, stop, rate
        ));
    }
    let mean = rates_mbps.iter().sum::<f64>() / rates_mbps.len() as f64;
    lines.push(format!(
        "[{:3}]  0.0-{:4.1} sec  5.00 MBytes  {:.2} Mbits/sec",
        port,
        rates_mbps.len() as f64 * interval,
        mean
    ));
    lines.join("\n")
}

#[test]
fn test_three_flows_over_ten_seconds() {
    let extractor = BandwidthLineExtractor::new(0.5, 10.0);
    let mut diagnostics = Diagnostics::new();
    let mut series = BTreeMap::new();

    for (n, base) in [(1u32, 10.0), (2, 20.0), (3, 30.0)] {
        let rates = vec![base; 20];
        let log = parse_flow_log(
            SourceId::new(format!("h{}", n)),
            iperf_log(n + 2, 0.5, &rates).lines(),
            &extractor,
            &mut diagnostics,
        )
        .expect("Generated log should parse");
        assert_eq!(log.series.len(), 20);
        assert_eq!(log.total_bandwidth, Some(base));
        series.insert(log.flow, log.series);
    }

    let windows = aggregate_flows(&series, &FlowSeriesAligner::default(), &mut diagnostics)
        .expect("Flows should align");

    assert_eq!(windows.len(), 20);
    for (i, window) in windows.iter().enumerate() {
        assert!((window.start - i as f64 * 0.5).abs() < 1e-9);
        assert_eq!(window.total, 60.0);
        assert!((window.variance - 66.666_666).abs() < 1e-3);
        assert_eq!(window.flows, 3);
    }
    assert!(diagnostics.is_empty());
}

#[test]
fn test_one_flow_short_of_windows_fails() {
    let extractor = BandwidthLineExtractor::new(0.5, 10.0);
    let mut diagnostics = Diagnostics::new();
    let mut series = BTreeMap::new();

    for (flow, windows) in [("h1", 20), ("h2", 19)] {
        let log = parse_flow_log(
            SourceId::new(flow),
            iperf_log(3, 0.5, &vec![5.0; windows]).lines(),
            &extractor,
            &mut diagnostics,
        )
        .unwrap();
        series.insert(log.flow, log.series);
    }

    match aggregate_flows(&series, &FlowSeriesAligner::default(), &mut diagnostics) {
        Err(AnalysisError::InconsistentWindowCount {
            start,
            count,
            expected,
            missing,
            ..
        }) => {
            assert!((start - 9.5).abs() < 1e-9);
            assert_eq!(count, 1);
            assert_eq!(expected, 2);
            assert_eq!(missing, vec![SourceId::new("h2")]);
        }
        other => panic!("expected inconsistent window count, got {:?}", other),
    }
}

#[test]
fn test_full_run_with_counters() {
    let extractor = BandwidthLineExtractor::new(0.5, 1.0);
    let mut diagnostics = Diagnostics::new();
    let flows = vec![
        parse_flow_log(
            SourceId::new("h1"),
            iperf_log(3, 0.5, &[8.0, 12.0]).lines(),
            &extractor,
            &mut diagnostics,
        )
        .unwrap(),
        parse_flow_log(
            SourceId::new("h2"),
            iperf_log(4, 0.5, &[4.0, 6.0]).lines(),
            &extractor,
            &mut diagnostics,
        )
        .unwrap(),
    ];

    let counter_text = "\
1699999999.500 seconds
  s1-eth3:       0      0    0    0    0     0          0         0        0      0    0    0    0     0       0          0
  s1-eth4:       0      0    0    0    0     0          0         0        0      0    0    0    0     0       0          0
cpu  500 10 200 9000 5 0 3 0 0 0
1700000000.000 seconds
  s1-eth3:  500000    400    0    0    0     0          0         0    12000    200    0    0    0     0       0          0
  s1-eth4:  250000    200    0    0    0     0          0         0     6000    100    0    0    0     0       0          0
cpu  560 10 230 9100 10 0 3 0 0 0
1700000000.500 seconds
  s1-eth3: 1250000   1000    0    0    0     0          0         0    30000    500    0    0    0     0       0          0
  s1-eth4:  625000    500    0    0    0     0          0         0    15000    250    0    0    0     0       0          0
cpu  600 10 260 9200 20 0 10 0 0 0";
    let counters = parse_counter_log(
        counter_text.lines(),
        &CounterLineExtractor::default(),
        1699999999.5,
        &mut diagnostics,
    )
    .unwrap();
    let destinations = BTreeMap::from([
        (SourceId::new("h1"), SourceId::new("s1-eth3")),
        (SourceId::new("h2"), SourceId::new("s1-eth4")),
    ]);

    let report = RunReport::build(
        2,
        flows,
        &counters,
        &destinations,
        &FlowSeriesAligner::default(),
        diagnostics,
    )
    .unwrap();

    assert_eq!(report.interval_totals.len(), 2);
    assert_eq!(report.interval_totals[0].total, 12.0);
    assert_eq!(report.interval_totals[1].total, 18.0);

    let rx = report.rx_totals.as_ref().expect("Every flow has a destination");
    assert_eq!(rx.len(), 2);
    assert!((rx[0].total - 12.0).abs() < 1e-9);
    assert!((rx[1].total - 18.0).abs() < 1e-9);

    assert_eq!(report.cpu.len(), 2);
    for window in &report.cpu {
        let sum: f64 = [
            window.user,
            window.nice,
            window.system,
            window.idle,
            window.iowait,
            window.softirq,
        ]
        .iter()
        .flatten()
        .sum();
        assert!((sum - 100.0).abs() <= 0.05, "cpu shares sum to {}", sum);
    }

    assert_eq!(report.total_bandwidth().total, 15.0);
    assert!(report.warnings.is_empty());
}
