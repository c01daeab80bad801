use abcp_compliance::FormRequest;
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

/// Lowercase, with every run of non-alphanumeric characters turned into a single space.
pub fn normalize_label(s: &str) -> String {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}

/// 0-based column index to Excel letters (0 -> A, 26 -> AA).
pub fn column_letters(idx: u32) -> String {
    let mut n = idx + 1;
    let mut res: Vec<char> = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        res.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    res.iter().rev().collect()
}

/// Excel letters to a 0-based column index. Case-insensitive.
pub fn parse_column_letters(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 3 {
        return None;
    }
    let mut n: u32 = 0;
    for c in s.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        n = n * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    Some(n - 1)
}

/// The fields of every form, in the order of the roster.
pub fn forms_to_json(forms: &[(u32, FormRequest)]) -> JSValue {
    let mut l: Vec<JSValue> = Vec::new();
    for (row, request) in forms.iter() {
        let mut fields: JSMap<String, JSValue> = JSMap::new();
        for (name, value) in request.fields.iter() {
            fields.insert(name.to_string(), json!(value));
        }
        l.push(json!({
            "row": row,
            "form": request.template.form_number(),
            "file": request.file_name,
            "fields": fields
        }));
    }
    JSValue::Array(l)
}
