use std::fmt::Write as _;

/// Minimal indenting XML writer
pub(crate) struct XmlWriter {
    buf: String,
    depth: usize,
}

impl XmlWriter {
    pub(crate) fn new() -> Self {
        Self {
            buf: String::new(),
            depth: 0,
        }
    }

    pub(crate) fn declaration(&mut self) {
        self.buf.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.buf.push_str("  ");
        }
    }

    fn start_tag(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.indent();
        self.buf.push('<');
        self.buf.push_str(name);
        for (key, value) in attrs {
            let _ = write!(self.buf, " {}=\"{}\"", key, escape(value));
        }
        self.buf.push('>');
    }

    pub(crate) fn open(&mut self, name: &str) {
        self.open_with_attrs(name, &[]);
    }

    pub(crate) fn open_with_attrs(&mut self, name: &str, attrs: &[(&str, &str)]) {
        self.start_tag(name, attrs);
        self.buf.push('\n');
        self.depth += 1;
    }

    pub(crate) fn close(&mut self, name: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        let _ = writeln!(self.buf, "</{}>", name);
    }

    pub(crate) fn leaf(&mut self, name: &str, text: &str) {
        self.leaf_with_attrs(name, &[], text);
    }

    pub(crate) fn leaf_with_attrs(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) {
        self.start_tag(name, attrs);
        let _ = writeln!(self.buf, "{}</{}>", escape(text), name);
    }

    pub(crate) fn finish(self) -> String {
        self.buf
    }
}

pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
