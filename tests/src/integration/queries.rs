//! Query RPC scenarios: correlation, bad-query and timeout results,
//! handler replacement, and reentrancy.

#[cfg(test)]
mod tests {
    use crate::integration::connect;
    use relay_bus::{Query, QueryResult};
    use relay_transport_mem::MemoryBroker;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_query_returns_handler_result() {
        let broker = MemoryBroker::new();
        let a = connect(&broker, "a").await;
        let b = connect(&broker, "b").await;

        b.on("ping", |_query: Query| async move {
            QueryResult::new(1, json!({"pong": true}))
        });

        let result = a.execute("b", Query::new("ping", json!({}))).await.unwrap();
        assert_eq!(result, QueryResult::new(1, json!({"pong": true})));
        assert_eq!(a.pending_queries(), 0);
    }

    #[tokio::test]
    async fn test_handler_sees_the_query_payload() {
        let broker = MemoryBroker::new();
        let a = connect(&broker, "a").await;
        let b = connect(&broker, "b").await;

        b.on("sum", |query: Query| async move {
            let total: i64 = query.data["terms"]
                .as_array()
                .map(|terms| terms.iter().filter_map(|t| t.as_i64()).sum())
                .unwrap_or_default();
            QueryResult::new(1, json!({"total": total}))
        });

        let result = a
            .execute("b", Query::new("sum", json!({"terms": [1, 2, 3, 4]})))
            .await
            .unwrap();
        assert_eq!(result, QueryResult::new(1, json!({"total": 10})));
    }

    #[tokio::test]
    async fn test_unregistered_query_answers_bad_query() {
        let broker = MemoryBroker::new();
        let a = connect(&broker, "a").await;
        let _b = connect(&broker, "b").await;

        let result = a
            .execute("b", Query::new("unknown", json!({})))
            .await
            .unwrap();
        assert_eq!(result, QueryResult::bad_query());
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_to_absent_bus_times_out() {
        let broker = MemoryBroker::new();
        let a = connect(&broker, "a").await;
        let _b = connect(&broker, "b").await;

        // Nobody subscribes bus/c/rpc; the query vanishes into the broker.
        let result = a.execute("c", Query::new("ping", json!({}))).await.unwrap();

        assert_eq!(result, QueryResult::timeout());
        assert_eq!(a.pending_queries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_result_is_dropped_not_misdelivered() {
        let broker = MemoryBroker::new();
        let a = connect(&broker, "a").await;
        let b = connect(&broker, "b").await;

        // Responds one second after the caller has already timed out.
        b.on("slow", |_query: Query| async move {
            sleep(Duration::from_secs(6)).await;
            QueryResult::new(7, json!({"too": "late"}))
        });
        b.on("fast", |_query: Query| async move {
            QueryResult::new(1, json!({"fast": true}))
        });

        let result = a.execute("b", Query::new("slow", json!({}))).await.unwrap();
        assert_eq!(result, QueryResult::timeout());
        assert_eq!(a.pending_queries(), 0);

        // Let the stale result arrive; it must land as an orphan.
        sleep(Duration::from_secs(2)).await;
        assert_eq!(a.pending_stats().orphaned.load(Ordering::Relaxed), 1);

        // A fresh query gets its own result, never the stale one.
        let result = a.execute("b", Query::new("fast", json!({}))).await.unwrap();
        assert_eq!(result, QueryResult::new(1, json!({"fast": true})));
    }

    #[tokio::test]
    async fn test_rebinding_a_query_replaces_the_handler() {
        let broker = MemoryBroker::new();
        let a = connect(&broker, "a").await;
        let b = connect(&broker, "b").await;

        b.on("version", |_query: Query| async move {
            QueryResult::new(1, json!("first"))
        });
        b.on("version", |_query: Query| async move {
            QueryResult::new(2, json!("second"))
        });

        let result = a
            .execute("b", Query::new("version", json!({})))
            .await
            .unwrap();
        assert_eq!(result, QueryResult::new(2, json!("second")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_queries_correlate_independently() {
        let broker = MemoryBroker::new();
        let a = connect(&broker, "a").await;
        let b = connect(&broker, "b").await;

        b.on("delay", |query: Query| async move {
            let ms = query.data["ms"].as_u64().unwrap_or(0);
            sleep(Duration::from_millis(ms)).await;
            QueryResult::new(1, json!({"ms": ms}))
        });

        let (slow, fast) = tokio::join!(
            a.execute("b", Query::new("delay", json!({"ms": 300}))),
            a.execute("b", Query::new("delay", json!({"ms": 100}))),
        );

        // The slower responder must not steal the faster one's slot.
        assert_eq!(slow.unwrap(), QueryResult::new(1, json!({"ms": 300})));
        assert_eq!(fast.unwrap(), QueryResult::new(1, json!({"ms": 100})));
        assert_eq!(a.pending_queries(), 0);
    }

    #[tokio::test]
    async fn test_handler_may_execute_nested_queries() {
        let broker = MemoryBroker::new();
        let a = connect(&broker, "a").await;
        let b = connect(&broker, "b").await;

        a.on("name", |_query: Query| async move {
            QueryResult::new(1, json!("alice"))
        });

        let b_for_handler = b.clone();
        b.on("greet", move |_query: Query| {
            let bus = b_for_handler.clone();
            async move {
                let name = bus
                    .execute("a", Query::new("name", json!({})))
                    .await
                    .map(|result| result.data)
                    .unwrap_or(json!("stranger"));
                QueryResult::new(1, json!({"greeting": format!("Hello {}", name.as_str().unwrap_or("?"))}))
            }
        });

        let result = a.execute("b", Query::new("greet", json!({}))).await.unwrap();
        assert_eq!(result, QueryResult::new(1, json!({"greeting": "Hello alice"})));
    }

    /// The concrete two-bus scenario: ping answered, unknown rejected,
    /// absent target timing out.
    #[tokio::test(start_paused = true)]
    async fn test_two_bus_ping_scenario() {
        let broker = MemoryBroker::new();
        let a = connect(&broker, "a").await;
        let b = connect(&broker, "b").await;

        b.on("ping", |_query: Query| async move {
            QueryResult::new(1, json!({"pong": true}))
        });

        let result = a.execute("b", Query::new("ping", json!({}))).await.unwrap();
        assert_eq!(result, QueryResult::new(1, json!({"pong": true})));

        let result = a
            .execute("b", Query::new("unknown", json!({})))
            .await
            .unwrap();
        assert_eq!(result, QueryResult::new(0, json!({"error": "Bad query"})));

        let result = a.execute("c", Query::new("ping", json!({}))).await.unwrap();
        assert_eq!(result, QueryResult::new(-1, json!({"error": "Timeout"})));
    }
}
