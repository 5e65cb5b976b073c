use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("chatwidget.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("chatwidget.client.request_errors");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("chatwidget.client.request_duration_seconds");

pub(crate) static STORE_SENDS: Counter = Counter::new("chatwidget.store.sends");
pub(crate) static STORE_SEND_FAILURES: Counter = Counter::new("chatwidget.store.send_failures");
pub(crate) static STORE_MALFORMED_REPLIES: Counter =
    Counter::new("chatwidget.store.malformed_replies");
pub(crate) static STORE_REJECTED_BUSY: Counter = Counter::new("chatwidget.store.rejected_busy");
pub(crate) static STORE_REJECTED_EMPTY: Counter = Counter::new("chatwidget.store.rejected_empty");
pub(crate) static STORE_EXCHANGE_DURATION: Moments =
    Moments::new("chatwidget.store.exchange_duration_seconds");

pub(crate) static MARKDOWN_RENDERS: Counter = Counter::new("chatwidget.markdown.renders");
pub(crate) static MARKDOWN_TABLES_WRAPPED: Counter =
    Counter::new("chatwidget.markdown.tables_wrapped");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_moments(&CLIENT_REQUEST_DURATION);

    collector.register_counter(&STORE_SENDS);
    collector.register_counter(&STORE_SEND_FAILURES);
    collector.register_counter(&STORE_MALFORMED_REPLIES);
    collector.register_counter(&STORE_REJECTED_BUSY);
    collector.register_counter(&STORE_REJECTED_EMPTY);
    collector.register_moments(&STORE_EXCHANGE_DURATION);

    collector.register_counter(&MARKDOWN_RENDERS);
    collector.register_counter(&MARKDOWN_TABLES_WRAPPED);
}
