fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use drivedeploy_graph::types::{
        ChunkAckResponse, DriveErrorResponse, DriveItem, UploadSessionResponse,
    };

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and
    /// compares the JSON values. Pins the wire format the server actually
    /// speaks: camelCase field names, range strings, RFC 3339 timestamps.
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
    }

    #[test]
    fn fixture_upload_session_response() {
        roundtrip_test::<UploadSessionResponse>("upload_session_response.json");
    }

    #[test]
    fn fixture_chunk_ack_response() {
        roundtrip_test::<ChunkAckResponse>("chunk_ack_response.json");
    }

    #[test]
    fn fixture_drive_item() {
        roundtrip_test::<DriveItem>("drive_item.json");
    }

    #[test]
    fn fixture_drive_error() {
        roundtrip_test::<DriveErrorResponse>("drive_error.json");
    }

    #[test]
    fn fixture_ranges_parse_into_session_snapshot() {
        let body: UploadSessionResponse =
            serde_json::from_value(load_fixture("upload_session_response.json")).unwrap();
        let session = drivedeploy_graph::UploadSession::from_response(body).unwrap();
        assert!(!session.is_complete());
        assert_eq!(session.next_expected_ranges[0].start, 0);
        assert_eq!(session.next_expected_ranges[0].end, None);
    }

    #[test]
    fn fixture_ack_ranges_parse_bounded_and_open() {
        let ack: ChunkAckResponse =
            serde_json::from_value(load_fixture("chunk_ack_response.json")).unwrap();
        let ranges = drivedeploy_graph::types::parse_expected_ranges(&ack.next_expected_ranges)
            .unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].start, 12_345_678);
        assert_eq!(ranges[0].end, None);
        assert_eq!(ranges[1].end, Some(52_428_799));
    }
}
