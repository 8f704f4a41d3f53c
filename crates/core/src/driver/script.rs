//! Scripts evaluated in the page to resolve [`Intent`]s.
//!
//! Every script is a self-contained expression: the locator library below,
//! the intent serialized as JSON, and one operation over the matches. Button
//! texts are compared whole after whitespace folding and lowercasing, so
//! "Follow" never matches "Following".

use serde_json::Value;

use super::{Intent, ListScope};

const LOCATORS: &str = r#"
const norm = (s) => (s || '').replace(/\s+/g, ' ').trim().toLowerCase();
const textOf = (el) => norm(el.innerText || el.textContent);
const visible = (el) => {
	if (!el || !el.isConnected) return false;
	const rect = el.getBoundingClientRect();
	const style = getComputedStyle(el);
	return rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none';
};
const all = (root, sel) => (root ? Array.from(root.querySelectorAll(sel)) : []);
const exact = (root, sel, texts) => all(root, sel).filter((el) => texts.includes(textOf(el)));
const containing = (root, sel, texts) => all(root, sel).filter((el) => {
	const t = textOf(el);
	return texts.some((x) => t.includes(x));
});
const BUTTONS = 'button, div[role="button"]';
const ACTIONABLE = ['following', 'requested'];
const dialog = () => all(document, 'div[role="dialog"]').find(visible) || null;
const listRoot = (scope) => (scope === 'dialog' ? dialog() : document.querySelector('main'));
const rows = (scope) => exact(listRoot(scope), BUTTONS, ACTIONABLE).filter(visible);
const rowOwner = (button) => {
	let node = button;
	for (let depth = 0; node && depth < 8; depth += 1) {
		node = node.parentElement;
		const link = node && node.querySelector('a[href^="/"]');
		if (link) return link;
	}
	return null;
};
const find = (intent) => {
	switch (intent.kind) {
		case 'loginUsername':
		case 'accountUsername':
			return all(document, 'input[name="username"]');
		case 'loginPassword':
			return all(document, 'input[name="password"]');
		case 'loginSubmit':
			return [...all(document, 'button[type="submit"]'), ...exact(document, BUTTONS, ['log in'])];
		case 'cookieConsent':
			return exact(document, 'button', ['only allow essential cookies', 'allow all cookies', 'accept all', 'accept']);
		case 'dismissPrompt':
			return all(document, 'div[role="dialog"]').flatMap((d) => containing(d, 'button', ['not now', 'cancel']));
		case 'listDialog': {
			const d = dialog();
			return d ? [d] : [];
		}
		case 'listPage': {
			const main = document.querySelector('main');
			return main && exact(main, BUTTONS, ['following']).length ? [main] : [];
		}
		case 'followingLink':
			return [
				...all(document, `a[href="${CSS.escape(intent.path)}"]`),
				...containing(document, 'a[role="link"]', ['following']),
				...all(document, 'a[href$="/following/"]'),
			];
		case 'rows':
			return rows(intent.scope);
		case 'row': {
			const r = rows(intent.scope)[intent.index];
			return r ? [r] : [];
		}
		case 'rowOwner': {
			const r = rows(intent.scope)[intent.index];
			const link = r && rowOwner(r);
			return link ? [link] : [];
		}
		case 'profileAction':
			return [...all(document, 'button[aria-label="Following"]'), ...exact(document, BUTTONS, ACTIONABLE)];
		case 'confirmUnfollow':
			return exact(document, BUTTONS, ['unfollow', 'cancel request']);
		case 'followState':
			return exact(document, BUTTONS, ['follow', 'follow back']);
		default:
			return [];
	}
};
"#;

/// Operation applied to the matches of an intent.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Op {
	Count,
	Click,
	ClickAll,
	Text,
}

fn wrap(body: &str) -> String {
	format!("(() => {{{LOCATORS}\n{body}\n}})()")
}

fn intent_json(intent: &Intent) -> String {
	serde_json::to_string(intent).unwrap_or_else(|_| "{}".to_string())
}

/// Script resolving `intent` and applying `op`.
pub(crate) fn intent_op(intent: &Intent, op: Op) -> String {
	let body = match op {
		Op::Count => "return els.filter(visible).length;",
		Op::Click => {
			"const el = els.find(visible);
if (!el) return false;
el.scrollIntoView({ block: 'center' });
el.click();
return true;"
		}
		Op::ClickAll => {
			"const hits = els.filter(visible);
hits.forEach((el) => el.click());
return hits.length;"
		}
		Op::Text => {
			"const el = els.find(visible) || els[0];
if (!el) return null;
if (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA') return el.value;
if (el.tagName === 'A' && intent.kind === 'rowOwner') return (el.getAttribute('href') || '').split('/').filter(Boolean)[0] || null;
return el.innerText || el.textContent || '';"
		}
	};
	wrap(&format!("const intent = {};\nconst els = find(intent);\n{body}", intent_json(intent)))
}

/// Script typing `value` into the first visible match of `intent`.
pub(crate) fn fill(intent: &Intent, value: &str) -> String {
	let value = Value::String(value.to_string());
	wrap(&format!(
		"const intent = {};
const el = find(intent).find(visible);
if (!el) return false;
el.focus();
const proto = el.tagName === 'TEXTAREA' ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
Object.getOwnPropertyDescriptor(proto, 'value').set.call(el, {value});
el.dispatchEvent(new Event('input', {{ bubbles: true }}));
el.dispatchEvent(new Event('change', {{ bubbles: true }}));
return true;",
		intent_json(intent)
	))
}

/// Script scrolling the list one viewport.
pub(crate) fn scroll(scope: ListScope) -> String {
	match scope {
		ListScope::Dialog => wrap(
			"const d = dialog();
if (!d) return false;
const area = [d, ...all(d, '*')].find((el) => el.scrollHeight > el.clientHeight + 4 && /(auto|scroll)/.test(getComputedStyle(el).overflowY)) || d;
area.scrollBy(0, area.clientHeight || 600);
return true;",
		),
		ListScope::Page => wrap(
			"window.scrollBy(0, document.documentElement.clientHeight);
return true;",
		),
	}
}

/// Async script fetching JSON with the page's credentials; resolves to `null` on failure.
pub(crate) fn fetch_json(url: &str, headers: &[(&str, &str)]) -> String {
	let headers: serde_json::Map<String, Value> = headers
		.iter()
		.map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
		.collect();
	format!(
		"(async () => {{
	try {{
		const r = await fetch({url}, {{ credentials: 'include', headers: {headers} }});
		if (!r.ok) return null;
		return await r.json();
	}} catch (e) {{
		return null;
	}}
}})()",
		url = Value::String(url.to_string()),
		headers = Value::Object(headers),
	)
}

/// Expression reporting the document's ready state.
pub(crate) const READY_STATE: &str = "document.readyState";

/// Expression reporting the current location.
pub(crate) const LOCATION: &str = "location.href";

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn intent_is_embedded_as_json() {
		let script = intent_op(
			&Intent::Row {
				scope: ListScope::Page,
				index: 3,
			},
			Op::Click,
		);
		assert!(script.starts_with("(() => {"));
		assert!(script.contains(r#"const intent = {"kind":"row","scope":"page","index":3};"#));
		assert!(script.contains("el.click();"));
	}

	#[test]
	fn fill_value_is_escaped() {
		let script = fill(&Intent::LoginPassword, "p\"w'\n");
		assert!(script.contains(r#"set.call(el, "p\"w'\n")"#));
	}

	#[test]
	fn fetch_script_carries_headers_and_credentials() {
		let script = fetch_json("https://example.test/api?x=1", &[("X-IG-App-ID", "1")]);
		assert!(script.contains(r#"fetch("https://example.test/api?x=1""#));
		assert!(script.contains(r#"{"X-IG-App-ID":"1"}"#));
		assert!(script.contains("credentials: 'include'"));
	}

	#[test]
	fn follow_state_matches_whole_texts_only() {
		let script = intent_op(&Intent::FollowState, Op::Count);
		assert!(script.contains("['follow', 'follow back']"));
		assert!(script.contains("texts.includes(textOf(el))"));
	}
}
