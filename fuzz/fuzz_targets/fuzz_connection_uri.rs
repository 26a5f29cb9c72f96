#![no_main]

use fraiseql_tunnel::client::{ConnectionInfo, ConnectionUri};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(uri) = ConnectionUri::parse(s) else {
        return;
    };

    // Rewriting must always produce a string that parses back to the same target
    let rewritten = uri
        .with_addr("127.0.0.1:15432".parse().unwrap())
        .with_database(s)
        .to_string();
    let reparsed = ConnectionUri::parse(&rewritten).expect("rewritten URI must parse");
    assert_eq!(reparsed.port(), Some(15432));
    assert_eq!(reparsed.query(), uri.query());

    let _ = ConnectionInfo::from_uri(&uri);
});
