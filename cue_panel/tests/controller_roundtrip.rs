use cue_controller::{Controller, ControllerConfig};
use cue_panel::{CuePanel, LinkStatus, PanelConfig, PanelEvent, RawInput, WsConnector};
use std::time::Duration;

async fn wait_until(panel: &CuePanel, mut pred: impl FnMut(&CuePanel) -> bool) {
    let mut changes = panel.subscribe_changes();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !pred(panel) {
            if changes.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .expect("timeout waiting for panel");
}

fn panel_config(controller: &Controller) -> PanelConfig {
    let page = format!("http://{}/", controller.listen_addr());
    PanelConfig::for_page(&page)
        .unwrap()
        .with_reconnect_delay(Duration::from_millis(200))
        .with_cues(3, &[])
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panel_drives_a_live_controller() {
    let controller = Controller::spawn("127.0.0.1:0", ControllerConfig::default()).unwrap();
    let panel = CuePanel::start(&panel_config(&controller), WsConnector);

    wait_until(&panel, |p| p.status() == LinkStatus::Ready).await;
    assert_eq!(panel.board().card(0).unwrap().text(), "Cue 1");
    assert_eq!(
        panel.board().network_line(),
        Some("mode: ap - ip: 192.168.4.1")
    );

    panel.handle(PanelEvent::Input(RawInput::PointerDown { cue: 1 }));
    wait_until(&panel, |p| p.board().card(1).unwrap().is_active()).await;

    panel.handle(PanelEvent::Input(RawInput::PointerUp { cue: 1 }));
    wait_until(&panel, |p| !p.board().card(1).unwrap().is_active()).await;

    panel.handle(PanelEvent::Focus { cue: 2 });
    panel.handle(PanelEvent::Edit {
        cue: 2,
        text: "Finale".to_string(),
    });
    panel.handle(PanelEvent::Blur { cue: 2 });

    // a second panel sees the rename through the controller
    let other = CuePanel::start(&panel_config(&controller), WsConnector);
    wait_until(&other, |p| p.board().card(2).unwrap().text() == "Finale").await;
    assert!(!panel.board().card(2).unwrap().is_focused());

    other.stop().await;
    panel.stop().await;
    controller.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panel_reconnects_when_controller_returns() {
    let controller = Controller::spawn("127.0.0.1:0", ControllerConfig::default()).unwrap();
    let addr = controller.listen_addr();
    let panel = CuePanel::start(&panel_config(&controller), WsConnector);
    wait_until(&panel, |p| p.status() == LinkStatus::Ready).await;

    tokio::task::spawn_blocking(move || controller.shutdown())
        .await
        .unwrap();
    wait_until(&panel, |p| p.status() == LinkStatus::Reconnecting).await;

    let addr = addr.to_string();
    let controller = tokio::task::spawn_blocking(move || {
        Controller::spawn(&addr, ControllerConfig::default())
    })
    .await
    .unwrap()
    .unwrap();
    wait_until(&panel, |p| p.status() == LinkStatus::Ready).await;
    assert!(panel.reconnects_scheduled() >= 1);

    panel.stop().await;
    controller.shutdown();
}
