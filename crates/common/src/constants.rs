/// How long the broker waits for an agent to answer a forwarded request
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Heartbeat interval for WebSocket ping frames sent by the agent
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// How long the agent waits for the broker's `init` after connecting
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Maximum request body the broker buffers for a single public request (10 MB)
pub const MAX_BODY_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Capacity of the per-connection outbound message queue
pub const OUTBOUND_QUEUE_CAPACITY: usize = 100;

/// Query parameter marking a registration request (`/?new`)
pub const REGISTRATION_PARAM: &str = "new";

/// Query parameter carrying the requested subdomain
pub const SUBDOMAIN_PARAM: &str = "subdomain";

/// Default broker port
pub const DEFAULT_BROKER_PORT: u16 = 1234;
