// Payload sniffing: decide which codec a downloaded body belongs to before decoding it.

pub mod format;
