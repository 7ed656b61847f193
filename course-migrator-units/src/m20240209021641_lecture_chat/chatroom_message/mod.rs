pub mod create_table;
