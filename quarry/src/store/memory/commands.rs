use crate::common::{
    Document, SortOrder, Value, CMD_COUNT, CMD_DROP, CMD_ERRMSG, CMD_MAP_REDUCE, CMD_N, CMD_OK,
    CMD_RESULT, DOC_ID, MR_VALUE,
};
use crate::doc;
use crate::store::memory::cursor::{page, sort_documents};
use crate::store::memory::server::InMemoryDatabase;
use crate::store::memory::{Emitter, InMemoryServer};
use std::collections::BTreeMap;

fn ok_reply() -> Document {
    let mut reply = Document::new();
    reply.put(CMD_OK, 1);
    reply
}

fn error_reply(message: &str) -> Document {
    log::debug!("Command failed: {}", message);
    let mut reply = Document::new();
    reply.put(CMD_OK, 0);
    reply.put(CMD_ERRMSG, message);
    reply
}

fn code_of(value: Option<&Value>) -> Option<&str> {
    match value {
        Some(Value::Code(code)) | Some(Value::String(code)) => Some(code),
        _ => None,
    }
}

fn sort_spec(value: Option<&Value>) -> Vec<(String, SortOrder)> {
    match value.and_then(|v| v.as_document()) {
        Some(sort) => sort
            .iter()
            .map(|(field, direction)| {
                (field.clone(), SortOrder::from_direction(direction.as_i64().unwrap_or(1)))
            })
            .collect(),
        None => Vec::new(),
    }
}

fn positive(value: Option<&Value>) -> Option<u64> {
    value.and_then(|v| v.as_i64()).filter(|n| *n > 0).map(|n| n as u64)
}

/// Runs a database command and builds its reply.
///
/// Failures are reported in the reply (`ok: 0` with an `errmsg`), the way
/// a document server answers commands.
pub(crate) fn run_command(
    server: &InMemoryServer,
    database: &InMemoryDatabase,
    command: &Document,
) -> Document {
    let name = match command.keys().next() {
        Some(name) => name.clone(),
        None => return error_reply("empty command"),
    };

    match name.as_str() {
        CMD_COUNT => count(server, database, command),
        CMD_DROP => drop_collection(server, database, command),
        CMD_MAP_REDUCE => map_reduce(server, database, command),
        other => error_reply(&format!("no such command: '{}'", other)),
    }
}

fn matching(
    server: &InMemoryServer,
    database: &InMemoryDatabase,
    collection: &str,
    query: &Document,
) -> Result<Vec<Document>, String> {
    let mut result = Vec::new();
    for document in database.snapshot(collection) {
        match server.matcher().matches(&document, query) {
            Ok(true) => result.push(document),
            Ok(false) => {}
            Err(err) => return Err(err.message().to_string()),
        }
    }
    Ok(result)
}

fn count(server: &InMemoryServer, database: &InMemoryDatabase, command: &Document) -> Document {
    let collection = match command.get(CMD_COUNT).and_then(|v| v.as_str()) {
        Some(collection) => collection,
        None => return error_reply("count expects a collection name"),
    };
    let query = command
        .get("query")
        .and_then(|v| v.as_document())
        .cloned()
        .unwrap_or_default();

    let matched = match matching(server, database, collection, &query) {
        Ok(matched) => matched.len() as u64,
        Err(message) => return error_reply(&message),
    };

    let skip = positive(command.get("skip")).unwrap_or(0);
    let mut n = matched.saturating_sub(skip);
    if let Some(limit) = positive(command.get("limit")) {
        n = n.min(limit);
    }

    let mut reply = ok_reply();
    reply.put(CMD_N, n as i64);
    reply
}

fn drop_collection(
    server: &InMemoryServer,
    database: &InMemoryDatabase,
    command: &Document,
) -> Document {
    let collection = match command.get(CMD_DROP).and_then(|v| v.as_str()) {
        Some(collection) => collection,
        None => return error_reply("drop expects a collection name"),
    };

    if server.is_read_only() {
        return error_reply("server is read only");
    }

    if database.drop_collection(collection) {
        let mut reply = ok_reply();
        reply.put("ns", collection);
        reply
    } else {
        error_reply("ns not found")
    }
}

fn map_reduce(
    server: &InMemoryServer,
    database: &InMemoryDatabase,
    command: &Document,
) -> Document {
    let collection = match command.get(CMD_MAP_REDUCE).and_then(|v| v.as_str()) {
        Some(collection) => collection.to_string(),
        None => return error_reply("mapreduce expects a collection name"),
    };
    let output = match command.get("out").and_then(|v| v.as_str()) {
        Some(output) => output.to_string(),
        None => return error_reply("mapreduce expects an output collection"),
    };
    if server.is_read_only() {
        return error_reply("server is read only");
    }

    let functions = server.functions();
    let map = match code_of(command.get("map")) {
        Some(code) => match functions.map(code) {
            Some(map) => map,
            None => return error_reply(&format!("unknown map function {:?}", code)),
        },
        None => return error_reply("mapreduce expects a map function"),
    };
    let reduce = match code_of(command.get("reduce")) {
        Some(code) => match functions.reduce(code) {
            Some(reduce) => reduce,
            None => return error_reply(&format!("unknown reduce function {:?}", code)),
        },
        None => return error_reply("mapreduce expects a reduce function"),
    };
    let finalize = match code_of(command.get("finalize")) {
        Some(code) => match functions.finalize(code) {
            Some(finalize) => Some(finalize),
            None => return error_reply(&format!("unknown finalize function {:?}", code)),
        },
        None => None,
    };

    let query = command
        .get("query")
        .and_then(|v| v.as_document())
        .cloned()
        .unwrap_or_default();
    let scope = command
        .get("scope")
        .and_then(|v| v.as_document())
        .cloned()
        .unwrap_or_default();

    let mut input = match matching(server, database, &collection, &query) {
        Ok(input) => input,
        Err(message) => return error_reply(&message),
    };
    sort_documents(&mut input, &query, &sort_spec(command.get("sort")));
    let input = page(input, None, positive(command.get("limit")));

    let mut emitter = Emitter::new();
    for document in input.iter() {
        map(document, &scope, &mut emitter);
    }
    let emitted = emitter.len();

    let mut groups: BTreeMap<Value, Vec<Value>> = BTreeMap::new();
    for (key, value) in emitter.into_pairs() {
        groups.entry(key).or_default().push(value);
    }

    let mut results = Vec::with_capacity(groups.len());
    for (key, mut values) in groups {
        let reduced = if values.len() == 1 {
            values.remove(0)
        } else {
            reduce(&key, &values, &scope)
        };
        let value = match &finalize {
            Some(finalize) => finalize(&key, reduced, &scope),
            None => reduced,
        };

        let mut result = Document::new();
        result.put(DOC_ID, key);
        result.put(MR_VALUE, value);
        results.push(result);
    }

    let output_count = results.len();
    database.replace_collection(&output, results);
    log::debug!(
        "Map-reduce on {} wrote {} documents to {}",
        collection,
        output_count,
        output
    );

    let mut reply = ok_reply();
    reply.put(CMD_RESULT, output);
    reply.put(
        "counts",
        doc! {
            input: (input.len()),
            emit: emitted,
            output: output_count,
        },
    );
    reply
}
