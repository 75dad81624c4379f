pub mod mock_directory;
pub mod test_data;
