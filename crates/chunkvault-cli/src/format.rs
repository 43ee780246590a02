pub(crate) fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes >= GIB {
        format!("{:.2} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Collapse sorted chunk numbers into `a-b` spans for display.
pub(crate) fn format_chunk_spans(numbers: &[u64]) -> String {
    let mut spans: Vec<String> = Vec::new();
    let mut iter = numbers.iter().copied();
    let Some(mut start) = iter.next() else {
        return String::new();
    };
    let mut end = start;
    for n in iter {
        if end.checked_add(1) == Some(n) {
            end = n;
            continue;
        }
        spans.push(span(start, end));
        start = n;
        end = n;
    }
    spans.push(span(start, end));
    spans.join(", ")
}

fn span(start: u64, end: u64) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{start}-{end}")
    }
}
