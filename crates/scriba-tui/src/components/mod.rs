pub mod history_list;
