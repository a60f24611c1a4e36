//! Full runs from raw log text to a report

#[cfg(test)]
mod tests {
    use crate::analysis::alignment::FlowSeriesAligner;
    use crate::analysis::bandwidth::{BandwidthLineExtractor, parse_flow_log};
    use crate::analysis::counters::{CounterLineExtractor, parse_counter_log};
    use crate::analysis::errors::{AnalysisWarning, Diagnostics};
    use crate::analysis::records::{CpuCategory, SourceId};
    use crate::analysis::reporting::RunReport;
    use std::collections::BTreeMap;

    const H1_LOG: &str = "\
[  3]  0.0- 0.5 sec   625 KBytes  10.0 Mbits/sec
[  3]  0.5- 1.0 sec   625 KBytes  10.0 Mbits/sec
[  3]  0.0- 1.0 sec  1.25 MBytes  10.0 Mbits/sec";

    const H2_LOG: &str = "\
[  3]  0.0- 0.5 sec   312 KBytes  5.00 Mbits/sec
[  3]  0.5- 1.0 sec   625 KBytes  10.0 Mbits/sec";

    const COUNTERS: &str = "\
20.000 seconds
s1-eth3: 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
s1-eth4: 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
cpu  0 0 0 0 0 0 0 0 0 0
20.500 seconds
s1-eth3: 625000 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
s1-eth4: 312500 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
cpu  40 0 10 50 0 0 0 0 0 0
21.000 seconds
s1-eth3: 1250000 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
s1-eth4: 937500 0 0 0 0 0 0 0 0 0 0 0 0 0 0 0
cpu  80 0 20 100 0 0 0 0 0 0";

    fn build_report() -> RunReport {
        let extractor = BandwidthLineExtractor::new(0.5, 1.0);
        let mut diagnostics = Diagnostics::new();
        let flows = [("h1", H1_LOG), ("h2", H2_LOG)]
            .iter()
            .map(|(flow, text)| {
                parse_flow_log(SourceId::new(*flow), text.lines(), &extractor, &mut diagnostics)
                    .unwrap()
            })
            .collect();
        let counters = parse_counter_log(
            COUNTERS.lines(),
            &CounterLineExtractor::default(),
            20.0,
            &mut diagnostics,
        )
        .unwrap();
        let destinations = BTreeMap::from([
            (SourceId::new("h1"), SourceId::new("s1-eth3")),
            (SourceId::new("h2"), SourceId::new("s1-eth4")),
        ]);

        RunReport::build(
            2,
            flows,
            &counters,
            &destinations,
            &FlowSeriesAligner::default(),
            diagnostics,
        )
        .unwrap()
    }

    #[test]
    fn test_report_from_logs() {
        let report = build_report();

        assert_eq!(report.pairs, 2);
        assert_eq!(report.interval_totals.len(), 2);
        assert_eq!(report.interval_totals[0].total, 15.0);
        assert_eq!(report.interval_totals[0].variance, 6.25);
        assert_eq!(report.interval_totals[1].total, 20.0);
        assert_eq!(report.interval_totals[1].variance, 0.0);

        let rx_totals = report.rx_totals.as_ref().unwrap();
        assert_eq!(rx_totals[0].total, 15.0);
        assert_eq!(rx_totals[1].total, 20.0);

        assert_eq!(report.cpu.len(), 2);
        assert_eq!(report.mean_cpu_share(CpuCategory::User), Some(40.0));
        assert_eq!(report.mean_cpu_share(CpuCategory::Idle), Some(50.0));
    }

    #[test]
    fn test_report_carries_parse_warnings() {
        let report = build_report();

        assert_eq!(
            report.warnings,
            vec![AnalysisWarning::MissingSummary {
                flow: SourceId::new("h2")
            }]
        );

        let total = report.total_bandwidth();
        assert_eq!(total.total, 10.0);
        assert_eq!(total.unavailable, vec![SourceId::new("h2")]);
    }

    #[test]
    fn test_report_json_round_trip() {
        let report = build_report();
        let json = serde_json::to_string(&report).unwrap();
        let back: RunReport = serde_json::from_str(&json).unwrap();

        assert_eq!(back, report);
    }
}
