//! Header codecs for the client side of an HTTP/1.1 exchange: the request
//! head encoder and the response head decoder.

mod request_encoder;
mod response_decoder;

pub use request_encoder::RequestEncoder;
pub use response_decoder::ResponseHeadDecoder;
