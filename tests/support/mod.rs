pub mod softreg_env;
