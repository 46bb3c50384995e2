pub mod endpoint_reader;
pub mod report_writer;
