//! HTML pages. Everything interpolated from albums, filenames and captions
//! goes through [`escape`].

use std::collections::BTreeMap;

use axum::http::StatusCode;

const STYLE: &str = r#"
        body { font-family: sans-serif; margin: 2em auto; max-width: 960px; color: #222; }
        nav a { margin-right: 1em; }
        ul.albums li { margin: 0.3em 0; }
        .grid { display: flex; flex-wrap: wrap; gap: 1em; }
        figure { margin: 0; width: 220px; }
        figure img { width: 220px; height: 220px; object-fit: cover; border-radius: 4px; }
        figcaption { font-size: 0.9em; margin-top: 0.3em; }
        .empty { color: #888; }
"#;

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Percent-encodes a single URL path segment.
pub fn encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body>
    <nav><a href="/">Albums</a><a href="/upload">Upload</a></nav>
{body}
</body>
</html>
"#,
        title = escape(title),
    )
}

pub fn index(albums: &[String]) -> String {
    let body = if albums.is_empty() {
        r#"    <p class="empty">No albums yet.</p>"#.to_string()
    } else {
        let items: String = albums
            .iter()
            .map(|album| {
                format!(
                    "        <li><a href=\"/album/{}\">{}</a></li>\n",
                    encode_segment(album),
                    escape(album)
                )
            })
            .collect();
        format!("    <ul class=\"albums\">\n{items}    </ul>")
    };
    page("Albums", &format!("    <h1>Albums</h1>\n{body}"))
}

pub fn upload_form() -> String {
    page(
        "Upload",
        r#"    <h1>Upload images</h1>
    <form action="/upload" method="post" enctype="multipart/form-data">
        <p><label>Album <input type="text" name="album" placeholder="default"></label></p>
        <p><input type="file" name="images" accept="image/*" multiple></p>
        <p><button type="submit">Upload</button></p>
    </form>"#,
    )
}

pub fn album(name: &str, captions: &BTreeMap<String, String>) -> String {
    let body = if captions.is_empty() {
        r#"    <p class="empty">This album is empty.</p>"#.to_string()
    } else {
        let figures: String = captions
            .iter()
            .map(|(image, caption)| {
                format!(
                    "        <figure>\n            <img src=\"/uploads/{}/{}\" alt=\"{}\">\n            <figcaption>{}</figcaption>\n        </figure>\n",
                    encode_segment(name),
                    encode_segment(image),
                    escape(caption),
                    escape(caption),
                )
            })
            .collect();
        format!("    <div class=\"grid\">\n{figures}    </div>")
    };
    page(name, &format!("    <h1>{}</h1>\n{body}", escape(name)))
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let title = status.canonical_reason().unwrap_or("Error");
    page(
        title,
        &format!(
            "    <h1>{} {}</h1>\n    <p>{}</p>",
            status.as_u16(),
            escape(title),
            escape(message)
        ),
    )
}
