use bisect_core::threats::{dedup, ThreatCollector};

#[test]
fn collector_returns_all_names_in_order() {
    let (tx, rx) = crossbeam_channel::unbounded();
    let collector = ThreatCollector::spawn(rx).expect("spawn collector");
    for name in ["HEUR:B", "HEUR:A", "HEUR:B"] {
        tx.send(name.to_string()).expect("send name");
    }
    drop(tx);
    let names = collector.join().expect("join collector");
    assert_eq!(names, vec!["HEUR:B", "HEUR:A", "HEUR:B"]);
    let set = dedup(names);
    assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["HEUR:A", "HEUR:B"]);
}

#[test]
fn collector_exits_when_nothing_is_sent() {
    let (tx, rx) = crossbeam_channel::unbounded::<String>();
    let collector = ThreatCollector::spawn(rx).expect("spawn collector");
    drop(tx);
    assert!(collector.join().expect("join collector").is_empty());
}
