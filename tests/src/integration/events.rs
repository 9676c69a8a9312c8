//! Broadcast event scenarios: fan-out, delivery shape, handler ordering,
//! and self-loop suppression.

#[cfg(test)]
mod tests {
    use crate::integration::connect;
    use parking_lot::Mutex;
    use relay_bus::{BusId, Event, RemoteEvent};
    use relay_transport_mem::MemoryBroker;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_dispatch_reaches_remote_subscriber() {
        let broker = MemoryBroker::new();
        let a = connect(&broker, "a").await;
        let b = connect(&broker, "b").await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        b.subscribe("sensor.reading", move |event: RemoteEvent| {
            let _ = tx.send(event);
        });

        a.dispatch(Event::new("sensor.reading", json!({"celsius": 21.5})))
            .await
            .unwrap();

        let received = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("delivery")
            .expect("event");
        assert_eq!(received.source, BusId::from("a"));
        assert_eq!(received.name, "sensor.reading");
        assert_eq!(received.data, json!({"celsius": 21.5}));
    }

    #[tokio::test]
    async fn test_event_fans_out_to_every_other_bus() {
        let broker = MemoryBroker::new();
        let a = connect(&broker, "a").await;
        let b = connect(&broker, "b").await;
        let c = connect(&broker, "c").await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        for bus in [&b, &c] {
            let tx = tx.clone();
            let id = bus.id().clone();
            bus.subscribe("announce", move |event: RemoteEvent| {
                let _ = tx.send((id.clone(), event.source));
            });
        }

        a.dispatch(Event::new("announce", json!(null))).await.unwrap();

        let mut receivers = Vec::new();
        for _ in 0..2 {
            let (receiver, source) = timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("delivery")
                .expect("event");
            assert_eq!(source, BusId::from("a"));
            receivers.push(receiver.to_string());
        }
        receivers.sort();
        assert_eq!(receivers, vec!["b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_own_dispatch_never_reaches_own_subscribers() {
        let broker = MemoryBroker::new();
        let a = connect(&broker, "a").await;
        let _b = connect(&broker, "b").await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        a.subscribe("sensor.reading", move |event: RemoteEvent| {
            let _ = tx.send(event);
        });

        // "a" is subscribed to the events wildcard it also publishes to;
        // the envelope source check must filter this out.
        a.dispatch(Event::new("sensor.reading", json!({})))
            .await
            .unwrap();

        let silent = timeout(Duration::from_millis(250), rx.recv()).await;
        assert!(silent.is_err(), "self-originated event must be dropped");
    }

    #[tokio::test]
    async fn test_multiple_subscribers_run_in_registration_order() {
        let broker = MemoryBroker::new();
        let a = connect(&broker, "a").await;
        let b = connect(&broker, "b").await;

        let order = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        for tag in 1..=3 {
            let order = Arc::clone(&order);
            let done_tx = done_tx.clone();
            b.subscribe("tick", move |_| {
                order.lock().push(tag);
                let _ = done_tx.send(());
            });
        }

        a.dispatch(Event::new("tick", json!(null))).await.unwrap();

        for _ in 0..3 {
            timeout(Duration::from_secs(1), done_rx.recv())
                .await
                .expect("delivery")
                .expect("handler ran");
        }
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_events_keep_publication_order_per_topic() {
        let broker = MemoryBroker::new();
        let a = connect(&broker, "a").await;
        let b = connect(&broker, "b").await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        b.subscribe("counter", move |event: RemoteEvent| {
            let _ = tx.send(event.data);
        });

        for n in 0..10 {
            a.dispatch(Event::new("counter", json!(n))).await.unwrap();
        }

        for n in 0..10 {
            let data = timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("delivery")
                .expect("event");
            assert_eq!(data, json!(n));
        }
    }
}
