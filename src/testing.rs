//! 测试辅助：本地模拟目标服务

use std::net::SocketAddr;

use axum::Router;

/// 在 127.0.0.1 随机端口启动模拟目标，返回监听地址
pub async fn spawn_mock_target(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("绑定模拟服务端口失败");
    let addr = listener.local_addr().expect("获取模拟服务地址失败");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("模拟服务退出: {}", e);
        }
    });
    addr
}
