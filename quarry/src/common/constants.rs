// document constants
pub const DOC_ID: &str = "_id";
pub const ID_ALIAS: &str = "id";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";
pub const TIMESTAMP_FIELDS: [&str; 2] = [CREATED_AT, UPDATED_AT];

// query operator constants
pub const OP_NOT: &str = "$not";
pub const OP_IN: &str = "$in";
pub const OP_NIN: &str = "$nin";
pub const OP_NE: &str = "$ne";
pub const OP_GT: &str = "$gt";
pub const OP_GTE: &str = "$gte";
pub const OP_LT: &str = "$lt";
pub const OP_LTE: &str = "$lte";
pub const OP_SIZE: &str = "$size";
pub const OP_EXISTS: &str = "$exists";
pub const OP_ALL: &str = "$all";
pub const OP_MOD: &str = "$mod";
pub const OP_NEAR: &str = "$near";
pub const OP_MAX_DISTANCE: &str = "$maxDistance";
pub const OP_WHERE: &str = "$where";
pub const OP_SLICE: &str = "$slice";

// command constants
pub const CMD_COUNT: &str = "count";
pub const CMD_DROP: &str = "drop";
pub const CMD_MAP_REDUCE: &str = "mapreduce";
pub const CMD_OK: &str = "ok";
pub const CMD_ERRMSG: &str = "errmsg";
pub const CMD_RESULT: &str = "result";
pub const CMD_N: &str = "n";

// map-reduce output constants
pub const MR_VALUE: &str = "value";
pub const MR_OUTPUT_PREFIX: &str = "_mr";

// connection constants
pub const MEMORY_SCHEME: &str = "memory";
