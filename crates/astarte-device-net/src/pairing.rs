//! Device pairing: trading a pairing JWT for a broker URL and a signed
//! client certificate (§6, C5's `StartHandshake` step).

use crate::error::Result;

/// Material returned by a successful pairing request.
#[derive(Debug, Clone)]
pub struct PairingResponse {
    pub broker_url: String,
    pub client_crt_pem: String,
}

/// The capability the connection state machine needs to pair and, on cert
/// expiry, re-pair a device. Implementations own the HTTPS client and the
/// pairing API's URL shape; this trait hides both from the state machine.
pub trait PairingClient: Send + Sync {
    /// Registers (or re-registers) the device and obtains broker + cert.
    async fn obtain_credentials(&self, csr_pem: &str) -> Result<PairingResponse>;

    /// Asks the pairing API whether `client_crt_pem` is still valid.
    async fn verify_certificate(&self, client_crt_pem: &str) -> Result<bool>;
}

/// A scripted `PairingClient` double for tests: returns queued responses
/// in order, or the last one repeated once the queue is drained.
pub struct ScriptedPairingClient {
    responses: parking_lot::Mutex<Vec<PairingResponse>>,
    verify_result: bool,
}

impl ScriptedPairingClient {
    pub fn new(responses: Vec<PairingResponse>, verify_result: bool) -> Self {
        ScriptedPairingClient {
            responses: parking_lot::Mutex::new(responses),
            verify_result,
        }
    }
}

impl PairingClient for ScriptedPairingClient {
    async fn obtain_credentials(&self, _csr_pem: &str) -> Result<PairingResponse> {
        let mut q = self.responses.lock();
        if q.len() > 1 {
            Ok(q.remove(0))
        } else {
            Ok(q.last().cloned().expect("ScriptedPairingClient needs at least one response"))
        }
    }

    async fn verify_certificate(&self, _client_crt_pem: &str) -> Result<bool> {
        Ok(self.verify_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_client_replays_last_response() {
        let client = ScriptedPairingClient::new(
            vec![PairingResponse {
                broker_url: "mqtts://broker.example:8883".into(),
                client_crt_pem: "-----BEGIN CERTIFICATE-----".into(),
            }],
            true,
        );
        let r1 = client.obtain_credentials("csr").await.unwrap();
        let r2 = client.obtain_credentials("csr").await.unwrap();
        assert_eq!(r1.broker_url, r2.broker_url);
        assert!(client.verify_certificate(&r1.client_crt_pem).await.unwrap());
    }
}
