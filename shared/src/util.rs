use rand::Rng;

/// Characters used for generated identifiers
const ID_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate `prefix` followed by `length` characters drawn uniformly from `[A-Z0-9]`.
///
/// No uniqueness check happens here. Callers that persist the result must
/// treat a uniqueness conflict as possible and regenerate.
pub fn generate_id(prefix: &str, length: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut id = String::with_capacity(prefix.len() + length);
    id.push_str(prefix);
    for _ in 0..length {
        let idx = rng.gen_range(0..ID_ALPHABET.len());
        id.push(ID_ALPHABET[idx] as char);
    }
    id
}

pub fn generate_buyer_id() -> String {
    generate_id("BUY", 8)
}

pub fn generate_supplier_id() -> String {
    generate_id("SUP", 8)
}

pub fn generate_order_id() -> String {
    generate_id("ORD", 10)
}

pub fn generate_service_order_id() -> String {
    generate_id("SRV", 10)
}

/// Six decimal digits, leading zeros preserved
pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0u32..1_000_000))
}
