//! Page-side scripts and snapshot helpers.
//!
//! Scripts receive their arguments as JSON literals so selectors and text
//! never need manual escaping.

use serde_json::Value;

/// Cut a DOM snapshot down to `max_chars` characters for prompting.
pub fn trim_snapshot(raw: &str, max_chars: usize) -> String {
    match raw.char_indices().nth(max_chars) {
        Some((cut, _)) => format!(
            "{}\n... [truncated, {} total chars]",
            &raw[..cut],
            raw.chars().count()
        ),
        None => raw.to_string(),
    }
}

fn js_str(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

/// Resolves to `"found"`, `"missing"` or `"invalid:<message>"`.
pub fn probe_selector_js(selector: &str) -> String {
    format!(
        r#"(() => {{
  try {{
    return document.querySelector({sel}) ? 'found' : 'missing';
  }} catch (e) {{
    return 'invalid:' + e.message;
  }}
}})()"#,
        sel = js_str(selector)
    )
}

pub fn clear_value_js(selector: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (el && 'value' in el) {{ el.value = ''; }}
}})()"#,
        sel = js_str(selector)
    )
}

/// Click the innermost element whose text equals (`exact`) or contains `text`.
/// Resolves to `true` when something was clicked.
pub fn click_by_text_js(text: &str, exact: bool) -> String {
    format!(
        r#"(() => {{
  const needle = {text};
  const exact = {exact};
  const walker = document.createTreeWalker(document.body, NodeFilter.SHOW_ELEMENT);
  let node = walker.currentNode;
  while (node) {{
    const own = (node.innerText || node.textContent || '').trim();
    const hit = exact ? own === needle : own.includes(needle);
    const leafish = [...node.children].every(c => {{
      const t = (c.innerText || '').trim();
      return exact ? t !== needle : !t.includes(needle);
    }});
    if (hit && leafish && node !== document.body) {{
      node.scrollIntoView({{block: 'center'}});
      node.click();
      return true;
    }}
    node = walker.nextNode();
  }}
  return false;
}})()"#,
        text = js_str(text),
        exact = exact
    )
}

pub fn scroll_by_js(dy: i64) -> String {
    format!("window.scrollBy(0, {dy});")
}

/// Set a `<select>` value and fire `change`. Resolves to `false` when the
/// element is missing.
pub fn select_option_js(selector: &str, value: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector({sel});
  if (!el) return false;
  el.value = {value};
  el.dispatchEvent(new Event('input', {{bubbles: true}}));
  el.dispatchEvent(new Event('change', {{bubbles: true}}));
  return true;
}})()"#,
        sel = js_str(selector),
        value = js_str(value)
    )
}

pub const BANNER_ID: &str = "manual-login-banner";

/// Fixed banner asking the user to log in, with a countdown that removes
/// itself when it reaches zero.
pub fn manual_login_banner_js(timeout_secs: u64) -> String {
    format!(
        r#"(() => {{
  if (document.getElementById('{id}')) return;
  const div = document.createElement('div');
  div.id = '{id}';
  div.style = "position:fixed;top:10px;right:10px;z-index:999999;background:#fff4cc;padding:10px;border-radius:8px;border:1px solid #d4b000;font-size:13px;";
  div.innerHTML = "Please login manually within <span id='ml-timer'>{timeout}</span>s";
  document.body.appendChild(div);
  let t = {timeout};
  const timer = setInterval(() => {{
    t--;
    const el = document.getElementById('ml-timer');
    if (el) el.innerText = t;
    if (t <= 0) {{ clearInterval(timer); div.remove(); }}
  }}, 1000);
}})()"#,
        id = BANNER_ID,
        timeout = timeout_secs
    )
}

pub fn remove_banner_js() -> String {
    format!("(() => {{ const e = document.getElementById('{BANNER_ID}'); if (e) e.remove(); }})()")
}
