use serde_json::Value;

/// A context collection being accumulated for total-cap processing.
///
/// Collections are cut at item boundaries so the rendered `CONTEXT` stays
/// valid JSON.
pub struct Section {
    pub name: String,
    pub items: Vec<Value>,
    pub raw_items: usize,
    pub raw_chars: usize,
    pub truncated_per_section: bool,
    pub truncated_total_cap: bool,
    pub included: bool,
}

impl Section {
    pub fn new(name: &str, items: Vec<Value>) -> Self {
        let raw_chars = items_chars(&items);
        Self {
            name: name.to_string(),
            raw_items: items.len(),
            raw_chars,
            items,
            truncated_per_section: false,
            truncated_total_cap: false,
            included: true,
        }
    }

    pub fn chars(&self) -> usize {
        items_chars(&self.items)
    }
}

/// Serialized size of one item, plus one char for the separating comma.
fn item_chars(item: &Value) -> usize {
    item.to_string().len() + 1
}

fn items_chars(items: &[Value]) -> usize {
    items.iter().map(item_chars).sum()
}

/// Keep the leading items whose serialized size fits within `max_chars`.
pub fn truncate_items(items: Vec<Value>, max_chars: usize) -> (Vec<Value>, bool) {
    let mut used = 0;
    let total = items.len();
    let kept: Vec<Value> = items
        .into_iter()
        .take_while(|item| {
            used += item_chars(item);
            used <= max_chars
        })
        .collect();
    let truncated = kept.len() < total;
    (kept, truncated)
}

/// Apply total cap across accumulated sections in order.
pub fn apply_total_cap(sections: &mut [Section], total_max_chars: usize) {
    let mut accumulated: usize = 0;

    for section in sections.iter_mut() {
        if !section.included {
            continue;
        }

        let section_len = section.chars();

        if accumulated + section_len <= total_max_chars {
            accumulated += section_len;
        } else if accumulated < total_max_chars {
            let remaining = total_max_chars - accumulated;
            let (kept, _) = truncate_items(std::mem::take(&mut section.items), remaining);
            if kept.is_empty() {
                section.included = false;
            } else {
                section.truncated_total_cap = true;
            }
            accumulated += items_chars(&kept);
            section.items = kept;
        } else {
            section.items.clear();
            section.included = false;
        }
    }
}
