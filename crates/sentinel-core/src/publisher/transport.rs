use super::payload::Payload;
use crate::error::Result;

/// One outbound delivery call.
#[derive(Debug)]
pub struct DeliveryRequest<'a> {
    pub platform: &'a str,
    pub content_id: &'a str,
    /// Bearer token for the call.
    pub token: &'a str,
    pub payload: &'a Payload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status_code: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Delivers a payload to a platform. `Err` means the call could not be made
/// at all; a rejected call is an `Ok` response with a failure status.
pub trait DeliveryTransport {
    fn deliver(&self, request: &DeliveryRequest<'_>) -> Result<TransportResponse>;
}

/// Deterministic stand-in: accepted platforms succeed, every other platform fails.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    accepted: Vec<String>,
}

impl SimulatedTransport {
    pub fn new(accepted: Vec<String>) -> Self {
        Self { accepted }
    }
}

impl DeliveryTransport for SimulatedTransport {
    fn deliver(&self, request: &DeliveryRequest<'_>) -> Result<TransportResponse> {
        let accepted = self.accepted.iter().any(|p| p == request.platform);
        Ok(if accepted {
            TransportResponse {
                status_code: 200,
                body: "Success".into(),
            }
        } else {
            TransportResponse {
                status_code: 500,
                body: "Failed".into(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::payload::format_payload;
    use crate::types::ContentType;

    #[test]
    fn simulated_transport_is_deterministic() {
        let transport = SimulatedTransport::new(vec!["twitter".into()]);
        let payload = format_payload("twitter", ContentType::Tweet, "1", "x", None);
        let ok = transport
            .deliver(&DeliveryRequest {
                platform: "twitter",
                content_id: "1",
                token: "t",
                payload: &payload,
            })
            .unwrap();
        assert!(ok.is_success());

        let rejected = transport
            .deliver(&DeliveryRequest {
                platform: "mastodon",
                content_id: "1",
                token: "t",
                payload: &payload,
            })
            .unwrap();
        assert_eq!(rejected.status_code, 500);
        assert!(!rejected.is_success());
    }
}
