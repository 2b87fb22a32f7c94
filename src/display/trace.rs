use crate::compute::{TracedValue, Value};
use crate::provenance::Provenance;
use std::collections::HashMap;
use std::fmt::Write;

/// Renders the lineage of `field` as an indented audit tree.
///
/// Shared sub-lineages are printed once; later occurrences point back to the
/// level where they were first expanded.
pub fn format_trace(field: &TracedValue) -> String {
    let mut tracer = Tracer {
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    let _ = writeln!(tracer.output, "AUDIT TRACE for '{}':", field.name());
    let _ = writeln!(tracer.output, "--------------------------------------------------");
    tracer.trace_field(field, 1, "");
    tracer.output
}

struct Tracer {
    // Keyed by field address: identical Arcs are the same lineage node.
    visited_at_level: HashMap<usize, usize>,
    output: String,
}

impl Tracer {
    fn trace_field(&mut self, field: &TracedValue, level: usize, prefix: &str) {
        let key = field as *const TracedValue as usize;
        if let Some(&first_seen) = self.visited_at_level.get(&key) {
            let _ = writeln!(self.output, "{}{} -> (Ref to L{})", prefix, field.name(), first_seen);
            return;
        }
        self.visited_at_level.insert(key, level);

        let line_header = format!("[L{}] {}{}", level, field.name(), format_value(field.value()));

        match field.provenance() {
            Provenance::SourceFact { concept, period } => {
                let _ = writeln!(self.output, "{}{} -> Fact({} @ {})", prefix, line_header, concept, period);
            }
            Provenance::Assumed { description, author, .. } => {
                let by = author.as_deref().map(|a| format!(" by {}", a)).unwrap_or_default();
                let _ = writeln!(self.output, "{}{} -> Assumed(\"{}\"{})", prefix, line_header, description, by);
            }
            Provenance::Computed { expression, inputs, .. } => {
                let args: Vec<&str> = inputs.keys().map(String::as_str).collect();
                let _ = writeln!(self.output, "{}{} = {}({})", prefix, line_header, expression, args.join(", "));
                let children: Vec<&TracedValue> = inputs.values().map(|f| f.as_ref()).collect();
                self.recurse_children(prefix, &children, level);
            }
        }
    }

    fn recurse_children(&mut self, prefix: &str, children: &[&TracedValue], level: usize) {
        let stem = build_child_stem(prefix);
        for (i, child) in children.iter().enumerate() {
            let connector = if i == children.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            self.trace_field(child, level + 1, &full_prefix);
        }
    }
}

fn format_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::Scalar(s)) => format!(" [{:.3}]", s),
        Some(Value::Series(vec)) => match vec.len() {
            0 => " [len=0]".to_string(),
            1 => format!(" [{:.3}]", vec[0]),
            n => format!(" [{:.3}, ... len={}]", vec[0], n),
        },
        None => " [unresolved]".to_string(),
    }
}

fn build_child_stem(current_prefix: &str) -> String {
    current_prefix.replace("`--", "   ").replace("|--", "|  ")
}
