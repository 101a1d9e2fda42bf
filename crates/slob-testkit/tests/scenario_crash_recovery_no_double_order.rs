use slob_broker_paper::PaperBroker;
use slob_execution::{BrokerOrderMap, BrokerSubmitRequest, Side};
use slob_testkit::recover_pending_orders;

fn leg_request(order_id: &str) -> BrokerSubmitRequest {
    BrokerSubmitRequest {
        order_id: order_id.to_string(),
        symbol: "ES".to_string(),
        side: Side::Buy,
        quantity: 1,
        order_type: "LMT".to_string(),
        limit_price: Some(5000.0),
        time_in_force: "DAY".to_string(),
        transmit: true,
        parent_order_id: None,
        oca_group: None,
    }
}

/// A leg whose mapping survived the crash is never resubmitted; a leg whose
/// mapping was lost is resubmitted exactly once and the broker's own
/// idempotent submit (by `order_id`) prevents a second live order even if
/// recovery mistakenly re-submits it twice in one pass.
#[test]
fn recovery_resubmits_only_unmapped_legs() {
    let mut broker = PaperBroker::new(100_000_000_000);
    let known = leg_request("SLOB_a1b2c3d4_20260101_093000_ENTRY");
    let lost = leg_request("SLOB_a1b2c3d4_20260101_093000_SL");

    // Entry survived the crash: already in the broker and in the map.
    let resp = broker.submit_order(&known).expect("submit succeeds");
    let mut order_map = BrokerOrderMap::new();
    order_map.register(known.order_id.clone(), resp.broker_order_id.clone());

    // SL was persisted to the outbox but the ack never reached the map
    // before the crash — recovery must resubmit it.
    let pending = vec![known.clone(), lost.clone()];
    let report = recover_pending_orders(&mut broker, &mut order_map, &pending).expect("recovery succeeds");

    assert_eq!(report.inspected, 2);
    assert_eq!(report.already_known, 1);
    assert_eq!(report.resubmitted, 1);
    assert_eq!(broker.list_orders().len(), 2);
    assert!(order_map.broker_id(&lost.order_id).is_some());

    // A second recovery pass over the same pending set must be a no-op:
    // both legs are now known, and the broker's own idempotency means even
    // a forced resubmit would not create a third order.
    let report2 = recover_pending_orders(&mut broker, &mut order_map, &pending).expect("recovery succeeds");
    assert_eq!(report2.resubmitted, 0);
    assert_eq!(broker.list_orders().len(), 2);
}
