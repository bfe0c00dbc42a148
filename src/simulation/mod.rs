pub mod swap_stream;
