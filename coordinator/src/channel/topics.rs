//! MQTT topic definitions

/// Root segment of every coordinator topic
const TOPIC_ROOT: &str = "coa";

/// MQTT topic patterns
pub struct Topics;

impl Topics {
    /// Topic a coordinator receives requests on
    pub fn request(node_id: &str) -> String {
        format!("{}/{}/request", TOPIC_ROOT, node_id)
    }

    /// Topic a coordinator publishes responses to
    pub fn response(node_id: &str) -> String {
        format!("{}/{}/response", TOPIC_ROOT, node_id)
    }
}
