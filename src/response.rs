use axum::Json;
use serde::Serialize;

/// Uniform success envelope; errors use the mirror shape in `error.rs`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    pub data: T,
}

pub fn success<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status: "success",
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_with_status() {
        let Json(envelope) = success(serde_json::json!({ "id": 1 }));
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(r#""status":"success""#));
        assert!(json.contains(r#""data""#));
    }
}
