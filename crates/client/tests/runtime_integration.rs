use std::sync::Arc;
use std::time::Duration;

use msgsync_client::collaborators::memory::{
    ContentEvent, MemoryDialogs, MemoryFileManager, RecordingAccessObserver, RecordingObserver,
    StaticTempPassword,
};
use msgsync_client::config::ClientConfig;
use msgsync_client::logging::init_tracing;
use msgsync_client::managers::video_notes::VideoNotesManager;
use msgsync_client::managers::Collaborators;
use msgsync_client::runtime::ClientRuntime;
use msgsync_client::transport::RecordingTransport;
use msgsync_client::updates::UpdatesHub;
use msgsync_common::error::ClientError;
use msgsync_common::protocol::jsonrpc::Push;
use msgsync_common::protocol::rpc_methods::{MESSAGES_TRANSCRIBE_AUDIO, UPDATE_TRANSCRIBED_AUDIO};
use msgsync_common::types::{DialogId, Dimensions, FileId, MessageFullId, MessageId, ServerMessageId};
use serde_json::json;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    runtime: ClientRuntime,
    transport: Arc<RecordingTransport>,
    hub: UpdatesHub,
    observer: Arc<RecordingObserver<MessageFullId>>,
}

fn start() -> Harness {
    let _ = init_tracing("debug");
    let transport = Arc::new(RecordingTransport::default());
    let hub = UpdatesHub::new();
    let observer = Arc::new(RecordingObserver::default());
    let collaborators = Collaborators {
        files: Arc::new(MemoryFileManager::default()),
        transport: transport.clone(),
        push_channel: Arc::new(hub.clone()),
        content_observer: observer.clone(),
        access_observer: Arc::new(RecordingAccessObserver::default()),
        dialogs: Arc::new(MemoryDialogs::default()),
        passwords: Arc::new(StaticTempPassword::default()),
    };
    let runtime = ClientRuntime::start(&ClientConfig::default(), &collaborators);
    Harness { runtime, transport, hub, observer }
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition should hold before the timeout");
}

fn message(server_id: i32) -> MessageFullId {
    MessageFullId::new(DialogId::new(42), MessageId::from_server(ServerMessageId::new(server_id)))
}

async fn attached_video_note(harness: &Harness, full_id: MessageFullId) -> FileId {
    harness
        .runtime
        .video_notes()
        .with(move |manager| {
            let file_id = manager.create_video_note(
                FileId::new(7),
                Vec::new(),
                None,
                12,
                Dimensions::new(240, 240),
                Vec::new(),
                false,
            );
            manager.register_video_note(file_id, full_id, "test");
            file_id
        })
        .await
        .expect("manager should be running")
}

fn recognize(
    harness: &Harness,
    full_id: MessageFullId,
) -> tokio::task::JoinHandle<Result<String, ClientError>> {
    let mailbox = harness.runtime.video_notes().clone();
    tokio::spawn(async move {
        mailbox
            .call(move |manager: &mut VideoNotesManager, promise| manager.recognize_speech(full_id, promise))
            .await
    })
}

#[tokio::test]
async fn transcription_waiters_share_one_request_and_the_final_push() {
    let harness = start();
    let full_id = message(3);
    let file_id = attached_video_note(&harness, full_id).await;

    let first = recognize(&harness, full_id);
    let transport = harness.transport.clone();
    eventually(|| transport.len() == 1).await;
    let (request, sink) = harness.transport.take().pop().expect("transcription should be requested");
    assert_eq!(request.method, MESSAGES_TRANSCRIBE_AUDIO);
    sink.deliver(Ok(json!({ "transcription_id": 5, "pending": true, "text": "a" })));

    let hub = harness.hub.clone();
    eventually(|| hub.subscriber_count() == 1).await;

    let second = recognize(&harness, full_id);
    let mailbox = harness.runtime.video_notes().clone();
    tokio::time::timeout(WAIT, async {
        loop {
            let waiters = mailbox
                .with(move |manager| {
                    manager.get_video_note(file_id).map_or(0, |note| note.transcription().waiter_count())
                })
                .await
                .expect("manager should be running");
            if waiters == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("second waiter should be queued");
    assert_eq!(harness.transport.len(), 0, "a partial transcription must not be requested again");

    let push = Push::new(UPDATE_TRANSCRIBED_AUDIO, json!({ "transcription_id": 5, "pending": false, "text": "ab" }));
    assert!(harness.hub.on_push(push).expect("push should decode"));

    assert_eq!(first.await.expect("task should finish"), Ok("ab".to_string()));
    assert_eq!(second.await.expect("task should finish"), Ok("ab".to_string()));
    assert_eq!(harness.hub.subscriber_count(), 0);

    let third = recognize(&harness, full_id).await.expect("task should finish");
    assert_eq!(third, Ok("ab".to_string()));
    assert_eq!(harness.transport.len(), 0, "a final transcription is served locally");
    assert_eq!(harness.observer.events().last(), Some(&ContentEvent::Finalized(full_id)));

    harness.runtime.wait().await;
}

#[tokio::test]
async fn final_push_right_behind_the_initial_reply_is_delivered() {
    let harness = start();
    let full_id = message(4);
    attached_video_note(&harness, full_id).await;

    let waiter = recognize(&harness, full_id);
    let transport = harness.transport.clone();
    eventually(|| transport.len() == 1).await;
    let (_, sink) = harness.transport.take().pop().expect("transcription should be requested");

    sink.deliver(Ok(json!({ "transcription_id": 6, "pending": true, "text": "a" })));
    let push = Push::new(UPDATE_TRANSCRIBED_AUDIO, json!({ "transcription_id": 6, "pending": false, "text": "ab" }));
    harness.hub.on_push(push).expect("push should decode");

    let text = tokio::time::timeout(WAIT, waiter)
        .await
        .expect("waiter should resolve")
        .expect("task should finish");
    assert_eq!(text, Ok("ab".to_string()));
    assert_eq!(harness.hub.subscriber_count(), 0);
    assert_eq!(harness.hub.early_push_count(), 0);

    harness.runtime.wait().await;
}

#[tokio::test]
async fn shutdown_ends_push_subscriptions() {
    let harness = start();
    let full_id = message(5);
    attached_video_note(&harness, full_id).await;

    let waiter = recognize(&harness, full_id);
    let transport = harness.transport.clone();
    eventually(|| transport.len() == 1).await;
    let (_, sink) = harness.transport.take().pop().expect("transcription should be requested");
    sink.deliver(Ok(json!({ "transcription_id": 7, "pending": true, "text": "a" })));
    let hub = harness.hub.clone();
    eventually(|| hub.subscriber_count() == 1).await;

    let Harness { runtime, hub, .. } = harness;
    runtime.wait().await;
    assert_eq!(waiter.await.expect("task should finish"), Err(ClientError::Shutdown));
    assert_eq!(hub.subscriber_count(), 0);
}

#[tokio::test]
async fn shutdown_cancels_pending_queries_and_ignores_late_replies() {
    let harness = start();
    let payments = harness.runtime.payments().clone();
    let pending = tokio::spawn({
        let payments = payments.clone();
        async move {
            payments
                .call(|manager, promise| manager.get_bank_card_info("4242424242424242".to_string(), promise))
                .await
        }
    });
    let transport = harness.transport.clone();
    eventually(|| transport.len() == 1).await;
    let (_, sink) = harness.transport.take().pop().expect("bank card query should be sent");

    let Harness { runtime, .. } = harness;
    runtime.wait().await;
    assert_eq!(pending.await.expect("task should finish"), Err(ClientError::Shutdown));

    sink.deliver(Ok(json!({ "title": "late", "open_urls": [] })));
    let after = payments.call(|manager, promise| manager.delete_saved_credentials(promise)).await;
    assert_eq!(after, Err(ClientError::Shutdown));
}

#[tokio::test]
async fn speech_in_an_inaccessible_chat_fails_every_waiter() {
    let harness = start();
    let full_id = MessageFullId::new(DialogId::new(0), MessageId::from_server(ServerMessageId::new(1)));
    attached_video_note(&harness, full_id).await;

    let result = recognize(&harness, full_id).await.expect("task should finish");
    assert_eq!(result, Err(ClientError::validation("Can't access the chat")));
    assert_eq!(harness.transport.len(), 0);

    harness.runtime.wait().await;
}
