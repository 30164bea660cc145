pub mod http_renderer;

pub use http_renderer::HttpDocumentRenderer;
