//! Resource Kinds
//!
//! The engine reports each request's purpose as a numeric code. The
//! codes follow the engine's request-info enumeration; anything not
//! listed (new engine versions, plugin types) classifies as `Other`.

use serde::{Deserialize, Serialize};

/// Purpose of a network request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Top-level document
    Document,
    /// Frame/iframe document
    Subdocument,
    Stylesheet,
    Script,
    Image,
    Font,
    /// Plugin object or generic sub-resource
    Object,
    /// Video/audio
    Media,
    Worker,
    SharedWorker,
    Prefetch,
    Favicon,
    /// XHR/fetch request
    Xhr,
    /// Beacon or hyperlink auditing ping
    Ping,
    ServiceWorker,
    CspReport,
    PluginResource,
    WebSocket,
    /// Unknown code
    Other,
}

impl ResourceKind {
    /// Map an engine resource-type code
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Document,
            1 => Self::Subdocument,
            2 => Self::Stylesheet,
            3 => Self::Script,
            4 => Self::Image,
            5 => Self::Font,
            6 => Self::Object,
            7 => Self::Media,
            8 => Self::Worker,
            9 => Self::SharedWorker,
            10 => Self::Prefetch,
            11 => Self::Favicon,
            12 => Self::Xhr,
            13 => Self::Ping,
            14 => Self::ServiceWorker,
            15 => Self::CspReport,
            16 => Self::PluginResource,
            254 => Self::WebSocket,
            _ => Self::Other,
        }
    }

    /// Label shown in the network inspector
    pub fn label(&self) -> &'static str {
        match self {
            Self::Document => "Document",
            Self::Subdocument => "Subdocument",
            Self::Stylesheet => "Stylesheet",
            Self::Script => "Script",
            Self::Image => "Image",
            Self::Font => "Font",
            Self::Object => "Object",
            Self::Media => "Media",
            Self::Worker => "Worker",
            Self::SharedWorker => "SharedWorker",
            Self::Prefetch => "Prefetch",
            Self::Favicon => "Favicon",
            Self::Xhr => "XHR",
            Self::Ping => "Ping",
            Self::ServiceWorker => "ServiceWorker",
            Self::CspReport => "CSP Report",
            Self::PluginResource => "Plugin Resource",
            Self::WebSocket => "WebSocket",
            Self::Other => "Other",
        }
    }

    /// Option name used by filter rules (`$script`, `$xmlhttprequest`, ...)
    pub fn filter_option(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Subdocument => "subdocument",
            Self::Stylesheet => "stylesheet",
            Self::Script => "script",
            Self::Image | Self::Favicon => "image",
            Self::Font => "font",
            Self::Object | Self::PluginResource => "object",
            Self::Media => "media",
            Self::Xhr => "xmlhttprequest",
            Self::Ping => "ping",
            Self::WebSocket => "websocket",
            Self::Worker
            | Self::SharedWorker
            | Self::ServiceWorker
            | Self::Prefetch
            | Self::CspReport
            | Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
