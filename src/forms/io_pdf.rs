//! Fillable PDF forms (AcroForm) through lopdf.

use log::debug;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use snafu::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::forms::*;

// Deeper field trees are treated as malformed.
const MAX_FIELD_DEPTH: usize = 32;

/// A terminal field of the form.
#[derive(Eq, PartialEq, Debug, Clone)]
struct FormField {
    /// Fully qualified name, with the names of the ancestors separated by '.'.
    name: String,
    id: ObjectId,
    /// `Tx`, `Btn`, `Ch`, `Sig`. Inherited from the ancestors when not set.
    field_type: Option<Vec<u8>>,
    widgets: Vec<ObjectId>,
}

impl FormField {
    /// The partial name of the field itself, without its ancestors.
    fn terminal_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Fills forms by writing field values and letting the viewer regenerate the appearances.
pub struct LopdfFiller;

impl FormFiller for LopdfFiller {
    fn field_names(&self, template: &Path) -> FormsResult<BTreeSet<String>> {
        let path = template.display().to_string();
        let doc = Document::load(template).context(OpeningPdfSnafu { path: path.clone() })?;
        let fields = collect_fields(&doc).context(NoFormSnafu { path })?;
        let mut names: BTreeSet<String> = BTreeSet::new();
        for f in fields.iter() {
            names.insert(f.terminal_name().to_string());
            names.insert(f.name.clone());
        }
        Ok(names)
    }

    fn fill(
        &self,
        template: &Path,
        output: &Path,
        values: &BTreeMap<String, String>,
    ) -> FormsResult<()> {
        let path = template.display().to_string();
        let mut doc = Document::load(template).context(OpeningPdfSnafu { path: path.clone() })?;
        let fields = collect_fields(&doc).context(NoFormSnafu { path })?;
        for field in fields.iter() {
            let value = match values
                .get(&field.name)
                .or_else(|| values.get(field.terminal_name()))
            {
                Some(v) => v,
                None => continue,
            };
            debug!("fill: {} = {:?}", field.name, value);
            match field.field_type.as_deref() {
                Some(b"Btn") => set_checkbox(&mut doc, field, value),
                _ => set_text(&mut doc, field, value),
            }
        }
        set_need_appearances(&mut doc);
        doc.save(output).map_err(|e| FormsError::WritingPdf {
            path: output.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        x => Some(x),
    }
}

fn dict_entry<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key)
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
}

fn root_id(doc: &Document) -> Option<ObjectId> {
    doc.trailer.get(b"Root").ok()?.as_reference().ok()
}

fn acroform(doc: &Document) -> Option<&Dictionary> {
    let catalog = doc.get_object(root_id(doc)?).ok()?.as_dict().ok()?;
    dict_entry(doc, catalog, b"AcroForm")
}

/// Text strings are either UTF-16BE with a byte order mark, or PDFDocEncoding
/// (read as Latin-1, which agrees on the printable range).
fn decode_text(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter(|c| c.len() == 2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        char::decode_utf16(units)
            .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    } else {
        bytes.iter().map(|b| *b as char).collect()
    }
}

fn encode_text(s: &str) -> Object {
    if s.is_ascii() {
        Object::string_literal(s)
    } else {
        let mut bytes: Vec<u8> = vec![0xFE, 0xFF];
        for unit in s.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }
}

fn collect_fields(doc: &Document) -> Option<Vec<FormField>> {
    let form = acroform(doc)?;
    let roots = resolve(doc, form.get(b"Fields").ok()?)?.as_array().ok()?;
    let mut res: Vec<FormField> = Vec::new();
    for obj in roots {
        if let Object::Reference(id) = obj {
            walk_field(doc, *id, None, None, 0, &mut res);
        }
    }
    debug!("collect_fields: {} fields", res.len());
    Some(res)
}

fn walk_field(
    doc: &Document,
    id: ObjectId,
    parent_name: Option<&str>,
    parent_type: Option<&[u8]>,
    depth: usize,
    res: &mut Vec<FormField>,
) {
    if depth > MAX_FIELD_DEPTH {
        return;
    }
    let dict = match doc.get_object(id).and_then(|o| o.as_dict()) {
        Ok(d) => d,
        Err(_) => return,
    };
    let partial = dict
        .get(b"T")
        .ok()
        .and_then(|t| t.as_str().ok())
        .map(decode_text);
    let has_name = partial.is_some();
    let name = match (parent_name, partial) {
        (Some(p), Some(t)) => Some(format!("{}.{}", p, t)),
        (None, Some(t)) => Some(t),
        (p, None) => p.map(|s| s.to_string()),
    };
    let field_type: Option<Vec<u8>> = dict
        .get(b"FT")
        .ok()
        .and_then(|o| o.as_name().ok())
        .map(|n| n.to_vec())
        .or_else(|| parent_type.map(|t| t.to_vec()));

    let kids: Vec<ObjectId> = dict
        .get(b"Kids")
        .ok()
        .and_then(|o| resolve(doc, o))
        .and_then(|o| o.as_array().ok())
        .map(|a| a.iter().filter_map(|k| k.as_reference().ok()).collect())
        .unwrap_or_default();
    // Kids without a name are the widgets of this field.
    let (named_kids, widgets): (Vec<ObjectId>, Vec<ObjectId>) = kids.into_iter().partition(|k| {
        doc.get_object(*k)
            .and_then(|o| o.as_dict())
            .map(|d| d.has(b"T"))
            .unwrap_or(false)
    });

    if !named_kids.is_empty() {
        for k in named_kids {
            walk_field(
                doc,
                k,
                name.as_deref(),
                field_type.as_deref(),
                depth + 1,
                res,
            );
        }
    } else if has_name {
        if let Some(n) = name {
            res.push(FormField {
                name: n,
                id,
                field_type,
                widgets: if widgets.is_empty() { vec![id] } else { widgets },
            });
        }
    }
}

fn set_text(doc: &mut Document, field: &FormField, value: &str) {
    if let Ok(d) = doc.get_object_mut(field.id).and_then(|o| o.as_dict_mut()) {
        d.set("V", encode_text(value));
    }
}

/// The name of the appearance that shows the box as checked.
fn on_state(doc: &Document, widget: ObjectId) -> Option<Vec<u8>> {
    let dict = doc.get_object(widget).ok()?.as_dict().ok()?;
    let ap = dict_entry(doc, dict, b"AP")?;
    let normal = dict_entry(doc, ap, b"N")?;
    normal
        .iter()
        .map(|(k, _)| k.clone())
        .find(|k| k.as_slice() != b"Off")
}

fn set_checkbox(doc: &mut Document, field: &FormField, value: &str) {
    let checked = !(value.is_empty() || value == "Off" || value == "No");
    let states: Vec<(ObjectId, Vec<u8>)> = field
        .widgets
        .iter()
        .map(|w| {
            let state = if checked {
                on_state(doc, *w).unwrap_or_else(|| b"Yes".to_vec())
            } else {
                b"Off".to_vec()
            };
            (*w, state)
        })
        .collect();
    let field_state = states
        .first()
        .map(|(_, s)| s.clone())
        .unwrap_or_else(|| b"Off".to_vec());
    for (w, state) in states {
        if let Ok(d) = doc.get_object_mut(w).and_then(|o| o.as_dict_mut()) {
            d.set("AS", Object::Name(state));
        }
    }
    if let Ok(d) = doc.get_object_mut(field.id).and_then(|o| o.as_dict_mut()) {
        d.set("V", Object::Name(field_state));
    }
}

fn set_need_appearances(doc: &mut Document) {
    let root = match root_id(doc) {
        Some(id) => id,
        None => return,
    };
    let form_ref = doc
        .get_object(root)
        .and_then(|o| o.as_dict())
        .and_then(|d| d.get(b"AcroForm"))
        .and_then(|o| o.as_reference())
        .ok();
    let form = match form_ref {
        Some(id) => doc.get_object_mut(id).and_then(|o| o.as_dict_mut()),
        None => doc
            .get_object_mut(root)
            .and_then(|o| o.as_dict_mut())
            .and_then(|d| d.get_mut(b"AcroForm"))
            .and_then(|o| o.as_dict_mut()),
    };
    if let Ok(f) = form {
        f.set("NeedAppearances", true);
    }
}
