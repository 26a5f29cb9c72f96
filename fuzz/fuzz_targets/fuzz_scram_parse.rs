#![no_main]

use fraiseql_tunnel::auth::ScramClient;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (String, String, String, String)| {
    let (username, password, server_first, server_final) = input;

    // Keep PBKDF2 cheap; the iteration count is attacker controlled
    if server_first
        .split(',')
        .filter_map(|part| part.strip_prefix("i="))
        .any(|i| i.parse::<u32>().map_or(false, |n| n > 4096))
    {
        return;
    }

    let mut client = ScramClient::new(username, password);
    let _ = client.client_first();

    if let Ok((_, state)) = client.client_final(&server_first) {
        let _ = client.verify_server_final(&server_final, &state);
    }
});
