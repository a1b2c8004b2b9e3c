mod relay;

pub const PAYLOAD_LEN: usize = 1024 * 1024;

pub fn random_payload(len: usize) -> Vec<u8> {
    let mut payload = vec![0; len];
    rand::fill(&mut payload[..]);
    payload
}
