//! End-to-end scenarios exercising the scheduler through its public API
//! only, with no gateway hardware involved.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gw_scheduler::{
    DownlinkMessage, LorawanTxConfig, Modulation, NoGatewayStatus, ProtocolConfiguration, Schedule,
    ScheduleConfig, ScheduleError, Semtech,
};
use tokio::time::timeout;

fn fsk_downlink(len: usize, bit_rate: u32) -> DownlinkMessage {
    DownlinkMessage::new(
        Bytes::from(vec![0u8; len]),
        ProtocolConfiguration::Lorawan(LorawanTxConfig {
            modulation: Modulation::Fsk,
            data_rate: String::new(),
            coding_rate: String::new(),
            bit_rate,
        }),
    )
}

async fn wait_until_inactive(schedule: &Schedule) {
    for _ in 0..200 {
        if !schedule.is_active().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("schedule never went inactive");
}

#[tokio::test]
async fn inactive_schedule_rejects_options_until_subscribed() {
    let schedule = Schedule::new(ScheduleConfig::default(), Arc::new(NoGatewayStatus), Arc::new(Semtech));
    schedule.sync(0).await;

    let err = schedule.get_option(1_000, 500).await.unwrap_err();
    assert!(matches!(err, ScheduleError::Inactive));

    let _downlinks = schedule.subscribe().await;
    assert!(schedule.is_active().await);
    schedule.get_option(1_000, 500).await.unwrap();
}

#[tokio::test]
async fn end_to_end_commit_and_dispatch() {
    let schedule = Schedule::new(ScheduleConfig::default(), Arc::new(NoGatewayStatus), Arc::new(Semtech));
    schedule.sync(0).await;
    let downlinks = schedule.subscribe().await;

    let (id, score) = schedule.get_option(500_000, 10_000).await.unwrap();
    assert_eq!(score, 0);

    schedule.schedule(&id, fsk_downlink(20, 50_000)).await.unwrap();

    let delivered = timeout(Duration::from_secs(3), downlinks.recv())
        .await
        .expect("dispatch should not hang")
        .expect("channel should still be open");
    assert_eq!(delivered.payload.len(), 20);

    schedule.stop().await;
}

#[tokio::test]
async fn overlapping_options_accumulate_score_then_clear_on_expiry() {
    let schedule = Schedule::new(ScheduleConfig::default(), Arc::new(NoGatewayStatus), Arc::new(Semtech));
    schedule.sync(0).await;
    let _downlinks = schedule.subscribe().await;

    let (_first, first_score) = schedule.get_option(0, 1_000).await.unwrap();
    assert_eq!(first_score, 0);

    let (_second, second_score) = schedule.get_option(500, 1_000).await.unwrap();
    assert_eq!(second_score, 1, "second option overlaps the first uncommitted one");

    let (_third, third_score) = schedule.get_option(50_000, 1_000).await.unwrap();
    assert_eq!(third_score, 0, "well-separated option has no overlap");

    schedule.stop().await;
}

#[tokio::test]
async fn stopping_all_subscribers_deactivates_the_schedule() {
    let schedule = Schedule::new(ScheduleConfig::default(), Arc::new(NoGatewayStatus), Arc::new(Semtech));
    schedule.sync(0).await;
    let _downlinks = schedule.subscribe().await;
    assert!(schedule.is_active().await);

    schedule.stop().await;
    wait_until_inactive(&schedule).await;

    let err = schedule.get_option(0, 1_000).await.unwrap_err();
    assert!(matches!(err, ScheduleError::Inactive));
}

#[tokio::test]
async fn undelivered_downlink_is_dropped_not_buffered() {
    let schedule = Schedule::new(ScheduleConfig::default(), Arc::new(NoGatewayStatus), Arc::new(Semtech));
    schedule.sync(0).await;
    // Subscribe to activate the schedule, then drop the receiver so no one
    // is listening when the downlink comes due.
    let _downlinks = schedule.subscribe().await;

    let (id, _) = schedule.get_option(100, 50).await.unwrap();
    schedule.schedule(&id, fsk_downlink(5, 50_000)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = schedule.stats().await;
    assert_eq!(snapshot.downlinks_dropped, 1);
    assert_eq!(snapshot.downlinks_dispatched, 0);

    schedule.stop().await;
}

#[tokio::test]
async fn downlink_channel_closes_once_last_subscriber_stops() {
    let schedule = Schedule::new(ScheduleConfig::default(), Arc::new(NoGatewayStatus), Arc::new(Semtech));
    schedule.sync(0).await;
    let downlinks = schedule.subscribe().await;
    assert!(schedule.is_active().await);

    schedule.stop().await;
    wait_until_inactive(&schedule).await;

    let received = timeout(Duration::from_secs(1), downlinks.recv())
        .await
        .expect("recv should not hang once the schedule has torn down");
    assert!(received.is_none(), "channel should be closed, not merely empty");
}

#[tokio::test]
async fn committing_a_reservation_twice_fails_the_second_time() {
    let schedule = Schedule::new(ScheduleConfig::default(), Arc::new(NoGatewayStatus), Arc::new(Semtech));
    schedule.sync(0).await;
    let _downlinks = schedule.subscribe().await;

    let (id, _) = schedule.get_option(1_000, 500).await.unwrap();
    schedule.schedule(&id, fsk_downlink(5, 50_000)).await.unwrap();

    let err = schedule.schedule(&id, fsk_downlink(5, 50_000)).await.unwrap_err();
    assert!(matches!(err, ScheduleError::NotFound(_)));

    schedule.stop().await;
}
