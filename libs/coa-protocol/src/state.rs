//! Result code taxonomy
//!
//! Every status travelling through the protocol is a [`ResultCode`]: an
//! integer partitioned into ranges (0 none, 2xx success, 4xx client error,
//! 5xx server error, >= 1000 domain specific). Registered codes live in one
//! ordered table that carries both the identifier and the display label, so
//! [`ResultCode::label`] stays total and new codes are a one-line addition.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

/// An integer-backed protocol status code
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultCode(u32);

/// Coarse classification of a [`ResultCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCategory {
    /// Code 0
    None,
    /// 200-299
    Success,
    /// 400-499
    ClientError,
    /// 500-599
    ServerError,
    /// 1000 and above
    Domain,
    /// Anything else (1xx, 3xx, 600-999)
    Unclassified,
}

macro_rules! result_codes {
    ($( $name:ident = $value:literal => $label:literal, )*) => {
        impl ResultCode {
            $( pub const $name: ResultCode = ResultCode($value); )*
        }

        /// (code, identifier, label), sorted by code
        const REGISTRY: &[(u32, &str, &str)] = &[
            $( ($value, stringify!($name), $label), )*
        ];
    };
}

result_codes! {
    NONE = 0 => "None",

    // HTTP success
    OK = 200 => "OK",
    ACCEPTED = 202 => "Accepted",

    // HTTP client errors
    BAD_REQUEST = 400 => "Bad Request",
    UNAUTHORIZED = 401 => "Unauthorized",
    FORBIDDEN = 403 => "Forbidden",
    NOT_FOUND = 404 => "Not Found",
    METHOD_NOT_ALLOWED = 405 => "Method Not Allowed",
    CONFLICT = 409 => "Conflict",
    STATUS_UNPROCESSABLE_ENTITY = 422 => "Unprocessable Entity",

    // HTTP server errors
    INTERNAL_ERROR = 500 => "Internal Error",

    // Config errors
    BAD_CONFIG = 1000 => "Bad Config",
    MISSING_CONFIG = 1001 => "Missing Config",

    // API invocation errors
    INVALID_ARGUMENT = 2000 => "Invalid Argument",
    API_REDIRECT = 3030 => "API Redirect",

    // IO errors
    FILE_ACCESS_ERROR = 4000 => "File Access Error",

    // Serialization errors
    SERIALIZATION_ERROR = 5000 => "Serialization Error",
    DESERIALIZE_ERROR = 5001 => "De-serialization Error",

    // Async requests
    DELETE_REQUESTED = 6000 => "Delete Requested",

    // Operation results
    UPDATE_FAILED = 8001 => "Update Failed",
    DELETE_FAILED = 8002 => "Delete Failed",
    VALIDATE_FAILED = 8003 => "Validate Failed",
    UPDATED = 8004 => "Updated",
    DELETED = 8005 => "Deleted",

    // Workflow status
    RUNNING = 9994 => "Running",
    PAUSED = 9995 => "Paused",
    DONE = 9996 => "Done",
    DELAYED = 9997 => "Delayed",
    UNTOUCHED = 9998 => "Untouched",
    NOT_IMPLEMENTED = 9999 => "Not Implemented",

    // Provider and workflow failures
    INIT_FAILED = 10000 => "Init Failed",
    CREATE_ACTION_CONFIG_FAILED = 10001 => "Create Action Config Failed",
    HELM_ACTION_FAILED = 10002 => "Helm Action Failed",
    GET_COMPONENT_SPEC_FAILED = 10003 => "Get Component Spec Failed",
    CREATE_PROJECTOR_FAILED = 10004 => "Create Projector Failed",
    K8S_REMOVE_SERVICE_FAILED = 10005 => "Remove K8s Service Failed",
    K8S_REMOVE_DEPLOYMENT_FAILED = 10006 => "Remove K8s Deployment Failed",
    K8S_DEPLOYMENT_FAILED = 10007 => "K8s Deployment Failed",
    READ_YAML_FAILED = 10008 => "Read Yaml Failed",
    APPLY_YAML_FAILED = 10009 => "Apply Yaml Failed",
    READ_RESOURCE_PROPERTY_FAILED = 10010 => "Read Resource Property Failed",
    APPLY_RESOURCE_FAILED = 10011 => "Apply Resource Failed",
    DELETE_YAML_FAILED = 10012 => "Delete Yaml Failed",
    DELETE_RESOURCE_FAILED = 10013 => "Delete Resource Failed",
    CHECK_RESOURCE_STATUS_FAILED = 10014 => "Check Resource Status Failed",
    APPLY_SCRIPT_FAILED = 10015 => "Apply Script Failed",
    REMOVE_SCRIPT_FAILED = 10016 => "Remove Script Failed",
    YAML_RESOURCE_PROPERTY_NOT_FOUND = 10017 => "Yaml or Resource Property Not Found",
    GET_HELM_PROPERTY_FAILED = 10018 => "Get Helm Property Failed",
    HELM_CHART_PULL_FAILED = 10019 => "Helm Chart Pull Failed",
    HELM_CHART_LOAD_FAILED = 10020 => "Helm Chart Load Failed",
    HELM_CHART_APPLY_FAILED = 10021 => "Helm Chart Apply Failed",
    HELM_CHART_UNINSTALL_FAILED = 10022 => "Helm Chart Uninstall Failed",
    INGRESS_APPLY_FAILED = 10023 => "Ingress Apply Failed",
    HTTP_NEW_REQUEST_FAILED = 10024 => "Http New Request Failed",
    HTTP_SEND_REQUEST_FAILED = 10025 => "Http Send Request Failed",
    HTTP_ERROR_RESPONSE = 10026 => "Http Error Response",
    MQTT_PUBLISH_FAILED = 10027 => "Mqtt Publish Failed",
    MQTT_APPLY_FAILED = 10028 => "Mqtt Apply Failed",
    MQTT_APPLY_TIMEOUT = 10029 => "Mqtt Apply Timeout",
    CONFIG_MAP_APPLY_FAILED = 10030 => "ConfigMap Apply Failed",
    HTTP_BAD_WAIT_STATUS_CODE = 10031 => "Http Bad Wait Status Code",
    HTTP_NEW_WAIT_REQUEST_FAILED = 10032 => "Http New Wait Request Failed",
    HTTP_SEND_WAIT_REQUEST_FAILED = 10033 => "Http Send Wait Request Failed",
    HTTP_ERROR_WAIT_RESPONSE = 10034 => "Http Error Wait Response",
    HTTP_BAD_WAIT_EXPRESSION = 10035 => "Http Bad Wait Expression",
    SCRIPT_EXECUTION_FAILED = 10036 => "Script Execution Failed",
    SCRIPT_RESULT_PARSING_FAILED = 10037 => "Script Result Parsing Failed",
    WAIT_TO_GET_INSTANCES_FAILED = 10038 => "Wait To Get Instances Failed",
    WAIT_TO_GET_SITES_FAILED = 10039 => "Wait To Get Sites Failed",
    WAIT_TO_GET_CATALOGS_FAILED = 10040 => "Wait To Get Catalogs Failed",
    INVALID_WAIT_OBJECT_TYPE = 10041 => "Invalid Wait Object Type",
    CATALOGS_GET_FAILED = 10042 => "Get Catalogs Failed",
    INVALID_INSTANCE_CATALOG = 10043 => "Invalid Instance Catalog",
    CREATE_INSTANCE_FROM_CATALOG_FAILED = 10044 => "Create Instance From Catalog Failed",
    INVALID_SOLUTION_CATALOG = 10045 => "Invalid Solution Object in Catalog",
    CREATE_SOLUTION_FROM_CATALOG_FAILED = 10046 => "Create Solution Object From Catalog Failed",
    INVALID_TARGET_CATALOG = 10047 => "Invalid Target Object in Catalog",
    CREATE_TARGET_FROM_CATALOG_FAILED = 10048 => "Create Target Object From Catalog Failed",
    INVALID_CATALOG_CATALOG = 10049 => "Invalid Catalog Object in Catalog",
    CREATE_CATALOG_FROM_CATALOG_FAILED = 10050 => "Create Catalog Object From Catalog Failed",
    PARENT_OBJECT_MISSING = 10051 => "Parent Object Missing",
    PARENT_OBJECT_CREATE_FAILED = 10052 => "Parent Object Create Failed",
    MATERIALIZE_BATCH_FAILED = 10053 => "Failed to Materialize all objects",
    DELETE_INSTANCE_FAILED = 10054 => "Failed to Delete Instance",
    CREATE_INSTANCE_FAILED = 10055 => "Failed to Create Instance",
    DEPLOYMENT_NOT_REACHED = 10056 => "Deployment Not Reached",
    INVALID_OBJECT_TYPE = 10057 => "Invalid Object Type",
    UNSUPPORTED_ACTION = 10058 => "Unsupported Action",
    INSTANCE_GET_FAILED = 10059 => "Get instance failed",
    TARGET_GET_FAILED = 10060 => "Get target failed",
    DELETE_SOLUTION_FAILED = 10061 => "Failed to Delete Solution",
    CREATE_SOLUTION_FAILED = 10062 => "Failed to Create Solution",
    GET_ARM_DEPLOYMENT_PROPERTY_FAILED = 10071 => "Get ARM Deployment Property Failed",
    ENSURE_ARM_RESOURCE_GROUP_FAILED = 10072 => "Ensure ARM Resource Group Failed",
    CREATE_ARM_DEPLOYMENT_FAILED = 10073 => "Create ARM Deployment Failed",
    CLEANUP_ARM_DEPLOYMENT_FAILED = 10074 => "Cleanup ARM Deployment Failed",

    // Instance controller errors
    SOLUTION_GET_FAILED = 11000 => "Solution does not exist",
    TARGET_CANDIDATES_NOT_FOUND = 11001 => "Target does not exist",
    TARGET_LIST_GET_FAILED = 11002 => "Target list does not exist",
    OBJECT_INSTANCE_CONVERSION_FAILED = 11003 => "Object to Instance conversion failed",
    TIMED_OUT = 11004 => "Timed Out",

    // Target controller errors
    TARGET_PROPERTY_NOT_FOUND = 12000 => "Target Property Not Found",

    // Non-transient errors
    GET_COMPONENT_PROPS_FAILED = 50000 => "Get component property failed",
}

impl ResultCode {
    /// Raw integer value
    pub const fn code(self) -> u32 {
        self.0
    }

    fn entry(self) -> Option<&'static (u32, &'static str, &'static str)> {
        REGISTRY
            .binary_search_by_key(&self.0, |(code, _, _)| *code)
            .ok()
            .map(|idx| &REGISTRY[idx])
    }

    /// Whether the code appears in the registered table
    pub fn is_registered(self) -> bool {
        self.entry().is_some()
    }

    /// Canonical human-readable label, `Unknown State: <code>` for unregistered codes
    pub fn label(self) -> String {
        match self.entry() {
            Some((_, _, label)) => (*label).to_string(),
            None => format!("Unknown State: {}", self.0),
        }
    }

    /// Identifier of a registered code (e.g. `INTERNAL_ERROR`)
    pub fn name(self) -> Option<&'static str> {
        self.entry().map(|(_, name, _)| *name)
    }

    /// Compare against a rendered label
    pub fn equals_label(self, label: &str) -> bool {
        self.label() == label
    }

    pub fn category(self) -> CodeCategory {
        match self.0 {
            0 => CodeCategory::None,
            200..=299 => CodeCategory::Success,
            400..=499 => CodeCategory::ClientError,
            500..=599 => CodeCategory::ServerError,
            1000.. => CodeCategory::Domain,
            _ => CodeCategory::Unclassified,
        }
    }

    pub fn is_success(self) -> bool {
        self.category() == CodeCategory::Success
    }

    /// Map an HTTP status code onto the taxonomy
    pub fn from_http_status(status: i64) -> ResultCode {
        match status {
            200 => ResultCode::OK,
            202 => ResultCode::ACCEPTED,
            200..=299 => ResultCode::OK,
            401 => ResultCode::UNAUTHORIZED,
            403 => ResultCode::FORBIDDEN,
            404 => ResultCode::NOT_FOUND,
            405 => ResultCode::METHOD_NOT_ALLOWED,
            409 => ResultCode::CONFLICT,
            400..=499 => ResultCode::BAD_REQUEST,
            500.. => ResultCode::INTERNAL_ERROR,
            _ => ResultCode::NONE,
        }
    }

    /// Decode a wire value; anything but a registered integer code becomes `INTERNAL_ERROR`
    pub fn from_wire_value(value: &serde_json::Value) -> ResultCode {
        let code = value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(ResultCode);
        match code {
            Some(code) if code.is_registered() => code,
            _ => {
                warn!("Unrecognized result code {}, using INTERNAL_ERROR", value);
                ResultCode::INTERNAL_ERROR
            }
        }
    }
}

/// Map an HTTP status code onto the taxonomy (total over all integers)
pub fn classify(status: i64) -> ResultCode {
    ResultCode::from_http_status(status)
}

impl Default for ResultCode {
    fn default() -> Self {
        ResultCode::OK
    }
}

impl From<u32> for ResultCode {
    fn from(code: u32) -> Self {
        ResultCode(code)
    }
}

impl From<ResultCode> for u32 {
    fn from(code: ResultCode) -> Self {
        code.0
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl fmt::Debug for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({})", name, self.0),
            None => write!(f, "ResultCode({})", self.0),
        }
    }
}

impl Serialize for ResultCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> Deserialize<'de> for ResultCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(ResultCode::from_wire_value(&value))
    }
}
