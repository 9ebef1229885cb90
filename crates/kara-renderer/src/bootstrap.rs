//! JavaScript bridge for webview renderers.
//!
//! A webview renderer binds native functions for the system methods,
//! then injects [`init_script`] before any page script runs. The script
//! opens the socket, registers, routes system frames to the bindings and
//! exposes a small `window.kara` API for application messages.

use crate::env::RendererEnv;

/// Native binding names the script calls for each system method.
pub const BINDINGS: [(&str, &str); 6] = [
    ("navigate", "_KARA_NAVIGATE_"),
    ("setTitle", "_KARA_SET_TITLE_"),
    ("stop", "_KARA_STOP_"),
    ("setHTML", "_KARA_SET_HTML_"),
    ("eval", "_KARA_EVAL_"),
    ("setSize", "_KARA_SET_SIZE_"),
];

const BRIDGE: &str = r#"
(function() {
    var K = window.__KARA_ENV__;
    var bindings = __BINDINGS__;
    var ws = new WebSocket(K.url);
    var listeners = {};
    var pending = {};

    function post(channel, args) {
        if (ws.readyState !== 1) return;
        ws.send(JSON.stringify({
            id: K.id,
            token: K.token,
            body: JSON.stringify({ channel: channel, args: args })
        }));
    }

    function newId() {
        var bytes = new Uint8Array(16);
        crypto.getRandomValues(bytes);
        return Array.prototype.map.call(bytes, function(b) {
            return ("0" + b.toString(16)).slice(-2);
        }).join("");
    }

    ws.onopen = function() {
        ws.send(JSON.stringify({ id: K.id, token: K.token, body: "_WS_REG_" }));
    };

    ws.onmessage = function(e) {
        var frame = JSON.parse(e.data.toString());
        if (frame.token !== K.token) return;
        var body = JSON.parse(frame.body);
        if (frame.type === "system") {
            var binding = bindings[body.method];
            if (binding && typeof window[binding] === "function") {
                window[binding].apply(window, body.args || []);
            }
            return;
        }
        var args = body.args || [];
        var wait = pending[args[0]];
        if (wait && wait.channel === body.channel) {
            delete pending[args[0]];
            if (args[1]) wait.reject(args[1]); else wait.resolve(args[2]);
        } else if (body.channel === "_getURL") {
            post("_getURL", [args[0], location.href]);
        }
        (listeners[body.channel] || []).forEach(function(fn) {
            fn.apply(null, args);
        });
    };

    window.kara = {
        id: K.id,
        send: function(channel) {
            post(channel, Array.prototype.slice.call(arguments, 1));
        },
        on: function(channel, fn) {
            (listeners[channel] = listeners[channel] || []).push(fn);
        },
        invoke: function(method) {
            var args = Array.prototype.slice.call(arguments, 1);
            var cid = newId();
            return new Promise(function(resolve, reject) {
                pending[cid] = { channel: method, resolve: resolve, reject: reject };
                post(method, [cid].concat(args));
            });
        }
    };
})();
"#;

/// The script a webview renderer injects for the window described by `env`.
pub fn init_script(env: &RendererEnv) -> String {
    let config = serde_json::json!({
        "id": env.id.as_str(),
        "url": env.url(),
        "token": env.token,
        "debug": env.debug,
    });
    let bindings: serde_json::Map<String, serde_json::Value> = BINDINGS
        .iter()
        .map(|(method, binding)| (method.to_string(), serde_json::Value::from(*binding)))
        .collect();

    format!(
        "window.__KARA_ENV__ = {};\n{}",
        config,
        BRIDGE.replace("__BINDINGS__", &serde_json::Value::Object(bindings).to_string())
    )
}
