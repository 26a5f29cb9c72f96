//! SCRAM-SHA-256 client (RFC 5802 / RFC 7677), as used by Postgres 10+

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// GS2 header for "client does not support channel binding"
const GS2_HEADER: &str = "n,,";

/// SCRAM authentication errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScramError {
    /// Server signature did not match
    #[error("invalid server proof: {0}")]
    InvalidServerProof(String),
    /// Server message could not be parsed
    #[error("invalid server message: {0}")]
    InvalidServerMessage(String),
    /// Base64 decoding error
    #[error("base64 error: {0}")]
    Base64(String),
}

/// State carried from the client-final step to server verification
#[derive(Clone, Debug)]
pub struct ScramState {
    auth_message: Vec<u8>,
    server_key: Vec<u8>,
}

/// SCRAM-SHA-256 client
pub struct ScramClient {
    username: String,
    password: String,
    nonce: String,
}

impl ScramClient {
    /// Create a client with a fresh random nonce
    pub fn new(username: String, password: String) -> Self {
        let nonce_bytes: [u8; 18] = rand::thread_rng().gen();
        Self::with_nonce(username, password, BASE64.encode(nonce_bytes))
    }

    fn with_nonce(username: String, password: String, nonce: String) -> Self {
        Self {
            username,
            password,
            nonce,
        }
    }

    fn client_first_bare(&self) -> String {
        format!("n={},r={}", escape_username(&self.username), self.nonce)
    }

    /// Client first message (`n,,n=<user>,r=<nonce>`)
    pub fn client_first(&self) -> String {
        format!("{}{}", GS2_HEADER, self.client_first_bare())
    }

    /// Process the server first message and build the client final message
    ///
    /// Returns (client_final_message, state for [`verify_server_final`](Self::verify_server_final))
    pub fn client_final(&mut self, server_first: &str) -> Result<(String, ScramState), ScramError> {
        let first = ServerFirst::parse(server_first)?;

        if !first.nonce.starts_with(&self.nonce) || first.nonce.len() == self.nonce.len() {
            return Err(ScramError::InvalidServerMessage(
                "server nonce does not extend the client nonce".to_string(),
            ));
        }

        let salt = BASE64
            .decode(first.salt)
            .map_err(|_| ScramError::Base64("invalid salt encoding".to_string()))?;
        let iterations = first.iterations.parse::<u32>().map_err(|_| {
            ScramError::InvalidServerMessage("invalid iteration count".to_string())
        })?;
        if iterations == 0 {
            return Err(ScramError::InvalidServerMessage(
                "iteration count must be positive".to_string(),
            ));
        }

        let without_proof = format!("c={},r={}", BASE64.encode(GS2_HEADER), first.nonce);
        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare(),
            server_first,
            without_proof
        );

        let salted = salted_password(&self.password, &salt, iterations);
        let client_key = hmac(&salted, b"Client Key");
        let stored_key = Sha256::digest(&client_key);
        let client_signature = hmac(&stored_key, auth_message.as_bytes());
        let proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(k, s)| k ^ s)
            .collect();

        let state = ScramState {
            auth_message: auth_message.into_bytes(),
            server_key: hmac(&salted, b"Server Key"),
        };

        Ok((
            format!("{},p={}", without_proof, BASE64.encode(proof)),
            state,
        ))
    }

    /// Verify the server final message (`v=<signature>`)
    pub fn verify_server_final(
        &self,
        server_final: &str,
        state: &ScramState,
    ) -> Result<(), ScramError> {
        if let Some(err) = server_final.strip_prefix("e=") {
            return Err(ScramError::InvalidServerProof(format!(
                "server reported error: {}",
                err
            )));
        }

        let encoded = server_final
            .strip_prefix("v=")
            .ok_or_else(|| ScramError::InvalidServerMessage("missing 'v=' prefix".to_string()))?;
        let signature = BASE64.decode(encoded.trim_end()).map_err(|_| {
            ScramError::Base64("invalid server signature encoding".to_string())
        })?;

        let expected = hmac(&state.server_key, &state.auth_message);
        if constant_time_compare(&signature, &expected) {
            Ok(())
        } else {
            Err(ScramError::InvalidServerProof(
                "server signature verification failed".to_string(),
            ))
        }
    }
}

/// `r=<nonce>,s=<salt>,i=<iterations>`
#[derive(Debug, PartialEq, Eq)]
struct ServerFirst<'a> {
    nonce: &'a str,
    salt: &'a str,
    iterations: &'a str,
}

impl<'a> ServerFirst<'a> {
    fn parse(msg: &'a str) -> Result<Self, ScramError> {
        let mut nonce = "";
        let mut salt = "";
        let mut iterations = "";

        for part in msg.split(',') {
            if let Some(value) = part.strip_prefix("r=") {
                nonce = value;
            } else if let Some(value) = part.strip_prefix("s=") {
                salt = value;
            } else if let Some(value) = part.strip_prefix("i=") {
                iterations = value;
            }
        }

        if nonce.is_empty() || salt.is_empty() || iterations.is_empty() {
            return Err(ScramError::InvalidServerMessage(
                "missing required fields in server first message".to_string(),
            ));
        }

        Ok(Self {
            nonce,
            salt,
            iterations,
        })
    }
}

/// RFC 5802 saslname escaping
fn escape_username(username: &str) -> String {
    username.replace('=', "=3D").replace(',', "=2C")
}

fn salted_password(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC key should be valid");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
