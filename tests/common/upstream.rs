//! Canned HTTP upstream standing in for Supabase, Stripe and GitHub

use std::io::Read;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Response, Server};

/// A request as the upstream saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub url: String,
    pub authorization: Option<String>,
    pub body: String,
}

pub struct Upstream {
    pub base: String,
    handle: JoinHandle<Vec<Recorded>>,
}

impl Upstream {
    /// Answer the next requests with `replies`, in order
    pub fn start(replies: &[(u16, &str)]) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let replies: Vec<(u16, String)> =
            replies.iter().map(|(status, body)| (*status, body.to_string())).collect();

        let handle = thread::spawn(move || {
            let mut seen = Vec::new();
            for (status, body) in replies {
                let mut request = match server.recv_timeout(Duration::from_secs(5)) {
                    Ok(Some(request)) => request,
                    _ => break,
                };
                let mut text = String::new();
                request.as_reader().read_to_string(&mut text).unwrap();
                let authorization = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.to_string());
                seen.push(Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    authorization,
                    body: text,
                });

                let response = Response::from_string(body)
                    .with_status_code(status)
                    .with_header(Header::from_bytes("Content-Type", "application/json").unwrap());
                request.respond(response).unwrap();
            }
            seen
        });

        Self { base: format!("http://127.0.0.1:{port}"), handle }
    }

    /// Requests received, once every reply has been used or the wait ran out
    pub fn finish(self) -> Vec<Recorded> {
        self.handle.join().unwrap()
    }
}
