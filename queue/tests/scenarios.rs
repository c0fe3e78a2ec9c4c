//! End-to-end queue scenarios through the dispatcher and broadcast hub.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use clinic_queue::{Command, DoctorId, QueueEnvironment, QueueReducer, QueueStore, ServerMessage, TicketStatus};
use clinic_queue_runtime::{Dispatcher, Origin};
use clinic_queue_testing::{SequentialIds, drain_frames, frame_types, init_test_logging, test_clock};
use serde_json::Value;
use std::sync::Arc;

fn dispatcher() -> Dispatcher<QueueReducer> {
    init_test_logging();
    Dispatcher::new(
        QueueStore::with_default_roster(),
        QueueReducer::new(),
        QueueEnvironment::new(Arc::new(test_clock()), Arc::new(SequentialIds::new())),
    )
}

fn take(name: &str, doctor: u32) -> Command {
    Command::TakeTicket {
        patient_name: name.to_string(),
        complaint: String::new(),
        doctor_id: DoctorId::new(doctor),
    }
}

fn last_of<'a>(frames: &'a [Value], kind: &str) -> &'a Value {
    frames
        .iter()
        .rev()
        .find(|f| f["type"] == kind)
        .unwrap_or_else(|| panic!("no {kind} frame"))
}

#[tokio::test]
async fn scenario_a_first_ticket() {
    let dispatcher = dispatcher();
    let (_, mut viewer) = dispatcher.connect().await.unwrap();

    dispatcher.send(take("Budi", 1), Origin::External).await.unwrap();

    let frames = drain_frames(&mut viewer);
    assert_eq!(frame_types(&frames), vec!["INITIAL_DATA", "TICKET_CREATED", "DASHBOARD_UPDATE"]);

    let ticket = &frames[1]["data"];
    assert_eq!(ticket["number"], 1);
    assert_eq!(ticket["patientName"], "Budi");
    assert_eq!(ticket["status"], "WAITING");
    assert_eq!(ticket["doctorName"], "Dr. Andi");
    assert_eq!(ticket["calledAt"], Value::Null);
    assert_eq!(frames[2]["data"]["totalMenunggu"], 1);
    assert_eq!(frames[2]["data"]["totalHariIni"], 1);
}

#[tokio::test]
async fn scenario_b_call_next() {
    let dispatcher = dispatcher();
    dispatcher.send(take("Budi", 1), Origin::External).await.unwrap();
    let (_, mut viewer) = dispatcher.connect().await.unwrap();

    let outcome = dispatcher.send(Command::CallNext, Origin::External).await.unwrap();

    assert_eq!(outcome.broadcasts, 4);
    let frames = drain_frames(&mut viewer);
    assert_eq!(
        frame_types(&frames),
        vec!["INITIAL_DATA", "DOCTOR_STATUS", "TICKET_CALLED", "STATUS_UPDATED", "DASHBOARD_UPDATE"]
    );
    assert_eq!(frames[1]["data"]["status"], "BUSY");
    assert_eq!(frames[2]["data"]["status"], "SERVING");
    assert!(frames[2]["data"]["calledAt"].is_string());
    let stats = &frames[4]["data"];
    assert_eq!((stats["totalMenunggu"].as_u64(), stats["totalDilayani"].as_u64()), (Some(0), Some(1)));
    assert_eq!((stats["dokterAvailable"].as_u64(), stats["dokterBusy"].as_u64()), (Some(1), Some(1)));
}

#[tokio::test]
async fn scenario_c_done_frees_doctor() {
    let dispatcher = dispatcher();
    dispatcher.send(take("Budi", 1), Origin::External).await.unwrap();
    dispatcher.send(Command::CallNext, Origin::External).await.unwrap();
    let (_, mut viewer) = dispatcher.connect().await.unwrap();

    dispatcher
        .send(
            Command::UpdateTicketStatus {
                number: 1,
                status: TicketStatus::Done,
            },
            Origin::External,
        )
        .await
        .unwrap();

    let frames = drain_frames(&mut viewer);
    assert_eq!(
        frame_types(&frames),
        vec!["INITIAL_DATA", "DOCTOR_STATUS", "STATUS_UPDATED", "DASHBOARD_UPDATE"]
    );
    assert_eq!(frames[1]["data"]["status"], "AVAILABLE");
    assert_eq!(frames[2]["data"]["status"], "DONE");
    assert_eq!(last_of(&frames, "DASHBOARD_UPDATE")["data"]["totalSelesai"], 1);

    let active = dispatcher.state(|s| s.find_active_tickets().len()).await;
    assert_eq!(active, 0);
}

#[tokio::test]
async fn scenario_d_empty_call_is_silent() {
    let dispatcher = dispatcher();
    let (_, mut viewer) = dispatcher.connect().await.unwrap();
    drain_frames(&mut viewer);

    let outcome = dispatcher.send(Command::CallNext, Origin::External).await.unwrap();

    assert!(outcome.is_no_op());
    assert!(drain_frames(&mut viewer).is_empty());
}

#[tokio::test]
async fn scenario_e_every_viewer_sees_the_same_stream() {
    let dispatcher = dispatcher();
    let (first, mut first_rx) = dispatcher.connect().await.unwrap();
    dispatcher.send(take("Budi", 1), Origin::Connection(first)).await.unwrap();

    // Joins after the first command
    let (_, mut second_rx) = dispatcher.connect().await.unwrap();
    dispatcher.send(take("Sari", 2), Origin::Connection(first)).await.unwrap();
    dispatcher.send(Command::CallNext, Origin::External).await.unwrap();

    let first_frames = drain_frames(&mut first_rx);
    let second_frames = drain_frames(&mut second_rx);

    assert_eq!(second_frames[0]["type"], "INITIAL_DATA");
    assert_eq!(second_frames[0]["data"]["tickets"].as_array().unwrap().len(), 1);
    // Everything after the second viewer joined is identical on both
    assert_eq!(&first_frames[3..], &second_frames[1..]);
    assert_eq!(
        frame_types(&second_frames[1..]),
        vec![
            "TICKET_CREATED",
            "DASHBOARD_UPDATE",
            "DOCTOR_STATUS",
            "TICKET_CALLED",
            "STATUS_UPDATED",
            "DASHBOARD_UPDATE",
        ]
    );
    assert_eq!(last_of(&second_frames, "TICKET_CALLED")["data"]["patientName"], "Budi");
}

#[tokio::test]
async fn invalid_input_only_reaches_the_sender() {
    let dispatcher = dispatcher();
    let (sender, mut sender_rx) = dispatcher.connect().await.unwrap();
    let (_, mut other_rx) = dispatcher.connect().await.unwrap();
    drain_frames(&mut sender_rx);
    drain_frames(&mut other_rx);

    dispatcher.send(take("", 1), Origin::Connection(sender)).await.unwrap();

    let frames = drain_frames(&mut sender_rx);
    assert_eq!(frame_types(&frames), vec!["ERROR"]);
    assert!(frames[0]["data"]["message"].as_str().unwrap().contains("patientName"));
    assert!(drain_frames(&mut other_rx).is_empty());
}

#[tokio::test]
async fn external_snapshot_is_returned_to_the_caller() {
    let dispatcher = dispatcher();
    let (_, mut viewer) = dispatcher.connect().await.unwrap();
    drain_frames(&mut viewer);

    let outcome = dispatcher
        .send(
            Command::RequestSnapshot {
                view: clinic_queue::SnapshotView::Doctors,
            },
            Origin::External,
        )
        .await
        .unwrap();

    assert_eq!(outcome.broadcasts, 0);
    assert!(matches!(&outcome.replies[..], [ServerMessage::DoctorList(doctors)] if doctors.len() == 2));
    assert!(drain_frames(&mut viewer).is_empty());
}

#[tokio::test]
async fn concurrent_tickets_get_unique_numbers() {
    let dispatcher = dispatcher();
    let handles: Vec<_> = (0..20)
        .map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .send(take(&format!("P{i}"), i % 2 + 1), Origin::External)
                    .await
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let numbers: Vec<u64> = dispatcher
        .state(|s| s.tickets().iter().map(|t| t.number).collect())
        .await;
    assert_eq!(numbers, (1..=20).collect::<Vec<_>>());
}
