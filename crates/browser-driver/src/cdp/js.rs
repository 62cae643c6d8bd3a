//! JavaScript snippets injected for selector resolution and page actions.
//!
//! Non-CSS locator strategies (xpath, text, role, testid) are resolved in
//! the page rather than through CDP element handles.

use crate::types::{
    ScrollAlignment, ScrollBehavior, ScrollDirection, Selector, SelectorKind, WaitState,
};

pub fn escape_js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}

/// Expression that resolves the selector to an element (or null), bound to
/// a local `__el` inside an IIFE body.
fn locate_snippet(selector: &Selector) -> String {
    let raw = escape_js_string(&selector.raw);
    match selector.kind {
        SelectorKind::Css | SelectorKind::Role | SelectorKind::Testid => {
            format!("let __el = document.querySelector({raw});")
        }
        SelectorKind::Xpath => format!(
            "let __el = document.evaluate({raw}, document, null, \
             XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;"
        ),
        SelectorKind::Text => {
            // `text=` prefix already stripped by normalisation where present.
            let needle = escape_js_string(selector.raw.strip_prefix("text=").unwrap_or(&selector.raw));
            format!(
                "let __el = Array.from(document.querySelectorAll('a, button, input, \
                 [role], label, summary, *')).find(e => \
                 e.childElementCount === 0 && (e.textContent || '').trim() === {needle}) \
                 || Array.from(document.querySelectorAll('*')).find(e => \
                 (e.textContent || '').includes({needle}));"
            )
        }
    }
}

/// Returns `{x, y}` of the element centre as JSON, or `null`.
pub fn element_center(selector: &Selector) -> String {
    let locate = locate_snippet(selector);
    format!(
        "(() => {{ {locate} if (!__el) return null; \
         const r = __el.getBoundingClientRect(); \
         return {{ x: r.left + r.width / 2, y: r.top + r.height / 2 }}; }})()"
    )
}

/// Returns `{x, y, width, height}` of the element box as JSON, or `null`.
pub fn element_box(selector: &Selector) -> String {
    let locate = locate_snippet(selector);
    format!(
        "(() => {{ {locate} if (!__el) return null; \
         const r = __el.getBoundingClientRect(); \
         return {{ x: r.x, y: r.y, width: r.width, height: r.height }}; }})()"
    )
}

/// Dispatches a DOM click on the element; returns true when found.
pub fn force_click(selector: &Selector) -> String {
    let locate = locate_snippet(selector);
    format!("(() => {{ {locate} if (!__el) return false; __el.click(); return true; }})()")
}

/// Boolean probe for the given wait state.
pub fn state_probe(selector: &Selector, state: WaitState) -> String {
    let locate = locate_snippet(selector);
    let check = match state {
        WaitState::Attached => "__el !== null && __el !== undefined",
        WaitState::Detached => "__el === null || __el === undefined",
        WaitState::Visible => {
            "(() => { if (!__el) return false; \
             const r = __el.getBoundingClientRect(); \
             const s = window.getComputedStyle(__el); \
             return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' \
                 && s.display !== 'none'; })()"
        }
        WaitState::Hidden => {
            "(() => { if (!__el) return true; \
             const r = __el.getBoundingClientRect(); \
             const s = window.getComputedStyle(__el); \
             return r.width === 0 || r.height === 0 || s.visibility === 'hidden' \
                 || s.display === 'none'; })()"
        }
    };
    format!("(() => {{ {locate} return {check}; }})()")
}

/// Fills a text-like input and fires input/change events.
pub fn fill_text(selector: &str, value: &str) -> String {
    let sel = escape_js_string(selector);
    let val = escape_js_string(value);
    format!(
        "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
         el.focus(); el.value = {val}; \
         el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()"
    )
}

/// Selects option(s) in a `<select>`; `values` is a JSON array literal.
pub fn select_options(selector: &str, values_json: &str, multiple: bool) -> String {
    let sel = escape_js_string(selector);
    format!(
        "(() => {{ const el = document.querySelector({sel}); \
         if (!el || el.tagName !== 'SELECT') return false; \
         const wanted = {values_json}; \
         if ({multiple}) {{ \
             for (const opt of el.options) opt.selected = wanted.includes(opt.value); \
         }} else {{ el.value = wanted[0]; }} \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()"
    )
}

/// Checks or unchecks a checkbox/radio input.
pub fn set_checked(selector: &str, checked: bool) -> String {
    let sel = escape_js_string(selector);
    format!(
        "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
         if (el.checked !== {checked}) {{ el.click(); }} \
         el.checked = {checked}; \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()"
    )
}

/// Runs the extractor list; returns a JSON object mapping names to values.
pub fn extract_all(specs_json: &str) -> String {
    format!(
        "(() => {{ const specs = {specs_json}; const out = {{}}; \
         for (const spec of specs) {{ \
             if (spec.multiple) {{ \
                 const els = Array.from(document.querySelectorAll(spec.selector)); \
                 out[spec.name] = els.map(el => spec.attribute === 'text' \
                     ? (el.innerText || '') : (el.getAttribute(spec.attribute) || '')); \
             }} else {{ \
                 const el = document.querySelector(spec.selector); \
                 if (!el) throw new Error('no element matches ' + spec.selector); \
                 out[spec.name] = spec.attribute === 'text' \
                     ? (el.innerText || '') : (el.getAttribute(spec.attribute) || ''); \
             }} \
         }} \
         return out; }})()"
    )
}

pub fn scroll_element(
    selector: &Selector,
    behavior: ScrollBehavior,
    block: ScrollAlignment,
    inline: ScrollAlignment,
) -> String {
    let locate = locate_snippet(selector);
    format!(
        "(() => {{ {locate} if (!__el) return false; \
         __el.scrollIntoView({{ behavior: '{}', block: '{}', inline: '{}' }}); \
         return true; }})()",
        behavior.as_js(),
        block.as_js(),
        inline.as_js()
    )
}

pub fn scroll_to(x: i64, y: i64, behavior: ScrollBehavior) -> String {
    format!(
        "window.scrollTo({{ left: {x}, top: {y}, behavior: '{}' }}); true",
        behavior.as_js()
    )
}

pub fn scroll_page(direction: ScrollDirection, amount: i64, behavior: ScrollBehavior) -> String {
    let behavior = behavior.as_js();
    match direction {
        ScrollDirection::Top => {
            format!("window.scrollTo({{ top: 0, behavior: '{behavior}' }}); true")
        }
        ScrollDirection::Bottom => format!(
            "window.scrollTo({{ top: document.body.scrollHeight, behavior: '{behavior}' }}); true"
        ),
        ScrollDirection::Up => {
            format!("window.scrollBy({{ top: -{amount}, behavior: '{behavior}' }}); true")
        }
        ScrollDirection::Down => {
            format!("window.scrollBy({{ top: {amount}, behavior: '{behavior}' }}); true")
        }
        ScrollDirection::Left => {
            format!("window.scrollBy({{ left: -{amount}, behavior: '{behavior}' }}); true")
        }
        ScrollDirection::Right => {
            format!("window.scrollBy({{ left: {amount}, behavior: '{behavior}' }}); true")
        }
    }
}
