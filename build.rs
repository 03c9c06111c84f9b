use chrono::Utc;

fn main() {
    // 构建时间戳，健康检查接口会带上 / build timestamp exposed via health check
    let build_time = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    println!("cargo:rustc-env=BUILD_TIME={}", build_time);

    println!("cargo:rerun-if-changed=build.rs");
}
